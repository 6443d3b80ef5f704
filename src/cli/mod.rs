use std::path::PathBuf;
use log::error;
use crate::api::ApiClient;
use crate::auth::IdentityClient;
use crate::config;
use crate::config::AppConfig;
use crate::entities::TagOperation;
use crate::query::{FileTypeFilter, SortKey};
use crate::session::{FileSessionStore, Session};
use crate::upload::{S3ObjectStore, Uploader};
use crate::views::*;

pub const CONFIG_KEYS: &[&str] = &["region", "bucket-name", "endpoint", "api-url", "client-id", "identity-endpoint"];

/// Parses `name` or `name:count`. The count defaults to 1 and must be at least 1.
pub fn parse_species_arg(value: &str) -> Result<(String, u32), String> {
    let (name, count) = match value.rsplit_once(':') {
        Some((name, count)) => {
            let count = count.trim().parse::<u32>().map_err(|_| format!("invalid count in '{}'", value))?;
            (name, count)
        }
        None => (value, 1),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing species name in '{}'", value));
    }
    if count < 1 {
        return Err(format!("count must be at least 1 in '{}'", value));
    }
    Ok((name.to_string(), count))
}

#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub species: Vec<(String, u32)>,
    pub file_type: FileTypeFilter,
    pub thumbnail_substring: Option<String>,
    pub min_count: u32,
    pub sort: SortKey,
    pub page: usize,
    pub offline: bool,
}

fn print_notices(toasts: &mut Toasts) {
    for notice in toasts.drain() {
        println!("{}", notice);
    }
}

async fn open_session(config: &AppConfig) -> anyhow::Result<Session<FileSessionStore>> {
    let session = Session::open(FileSessionStore::new(config.session_path.clone())).await?;
    Ok(session)
}

fn guard(route: Route, session: &Session<FileSessionStore>) -> bool {
    if route.resolve(session.is_authenticated()) == Route::Login {
        eprintln!("Not signed in. Run `birdtag sign-in` first.");
        return false;
    }
    true
}

fn identity_client(config: &AppConfig) -> anyhow::Result<IdentityClient> {
    let file_config = &config.file_config;
    if file_config.identity.client_id.is_empty() {
        anyhow::bail!("client-id is not configured");
    }
    Ok(IdentityClient::new(&file_config.identity_endpoint(), &file_config.identity.client_id)?)
}

fn api_client(config: &AppConfig) -> anyhow::Result<ApiClient> {
    if config.file_config.api_url.is_empty() {
        anyhow::bail!("api-url is not configured");
    }
    Ok(ApiClient::new(&config.file_config.api_url))
}

pub async fn sign_in(config: &AppConfig, email: &str, password: &str) -> anyhow::Result<bool> {
    let identity = identity_client(config)?;
    let mut session = open_session(config).await?;
    let mut toasts = Toasts::default();
    let route = LoginView::sign_in(email, password).submit(&identity, &mut session, &mut toasts).await;
    if route == Route::Home {
        toasts.success(format!("Welcome back to the nest, {}!", email));
    }
    print_notices(&mut toasts);
    Ok(route == Route::Home)
}

pub async fn sign_up(config: &AppConfig, email: &str, password: &str, confirm_password: &str) -> anyhow::Result<bool> {
    let identity = identity_client(config)?;
    let mut session = open_session(config).await?;
    let mut toasts = Toasts::default();
    let route = LoginView::sign_up(email, password, confirm_password).submit(&identity, &mut session, &mut toasts).await;
    print_notices(&mut toasts);
    if route == Route::Confirm {
        println!("Run `birdtag confirm --email {} --code <code>` to finish.", email);
    }
    Ok(route == Route::Confirm)
}

pub async fn confirm(config: &AppConfig, email: &str, code: &str) -> anyhow::Result<bool> {
    let identity = identity_client(config)?;
    let mut toasts = Toasts::default();
    let route = ConfirmView::new(email, code).submit(&identity, &mut toasts).await;
    print_notices(&mut toasts);
    Ok(route == Route::Login)
}

pub async fn logout(config: &AppConfig) -> anyhow::Result<bool> {
    let mut session = open_session(config).await?;
    let mut toasts = Toasts::default();
    crate::views::logout(&mut session, &mut toasts).await;
    let ok = !toasts.has(NoticeLevel::Error);
    if ok {
        toasts.info("Signed out");
    }
    print_notices(&mut toasts);
    Ok(ok)
}

pub async fn whoami(config: &AppConfig) -> anyhow::Result<bool> {
    let session = open_session(config).await?;
    if !guard(Route::Home, &session) {
        return Ok(false);
    }
    match session.claims() {
        Ok(claims) => {
            println!("sub: {}", claims.sub);
            println!("email: {}", claims.email.unwrap_or_default());
            Ok(true)
        }
        Err(e) => {
            error!("failed to read ID token: {}", e);
            Ok(false)
        }
    }
}

pub async fn search(config: &AppConfig, args: SearchArgs) -> anyhow::Result<bool> {
    let mut toasts = Toasts::default();
    let mut view = BrowseView::new();
    for (name, count) in &args.species {
        view.add_species(name, *count, &mut toasts);
    }
    view.set_file_type(args.file_type);
    view.set_thumbnail_substring(args.thumbnail_substring);
    view.set_min_count(args.min_count);
    view.sort = args.sort;

    view.page = args.page;
    let ok = if args.offline {
        view.browse_local();
        true
    } else {
        let session = open_session(config).await?;
        if !guard(Route::Browse, &session) {
            return Ok(false);
        }
        let client = api_client(config)?;
        let ok = view.search(&client, &session, &mut toasts).await;
        view.go_to_page(args.page);
        ok
    };
    print!("{}", view.render());
    print_notices(&mut toasts);
    Ok(ok)
}

pub async fn fullsize(config: &AppConfig, thumb_url: &str) -> anyhow::Result<bool> {
    let session = open_session(config).await?;
    if !guard(Route::Browse, &session) {
        return Ok(false);
    }
    let client = api_client(config)?;
    let mut toasts = Toasts::default();
    let url = BrowseView::new().show_fullsize(&client, &session, thumb_url, &mut toasts).await;
    if let Some(url) = &url {
        println!("{}", url);
    }
    print_notices(&mut toasts);
    Ok(url.is_some())
}

pub async fn update_tags(config: &AppConfig, urls: &[String], operation: TagOperation, tags: &[String]) -> anyhow::Result<bool> {
    let session = open_session(config).await?;
    if !guard(Route::Browse, &session) {
        return Ok(false);
    }
    let client = api_client(config)?;
    let mut toasts = Toasts::default();
    let updated = BrowseView::new().update_tags(&client, &session, urls, operation, tags, &mut toasts).await;
    for update in &updated {
        println!("{}  {}", update.status, update.url);
    }
    let ok = !toasts.has(NoticeLevel::Error);
    print_notices(&mut toasts);
    Ok(ok)
}

pub async fn upload(config: &AppConfig, paths: &[PathBuf], tags: Option<&str>) -> anyhow::Result<bool> {
    let session = open_session(config).await?;
    if !guard(Route::Upload, &session) {
        return Ok(false);
    }
    let uploader = Uploader::new(S3ObjectStore::new(&config.file_config)?);
    let mut toasts = Toasts::default();
    let mut view = UploadView::default();
    for path in paths {
        view.add_file(path, &mut toasts).await;
    }
    view.set_manual_tags(tags.unwrap_or_default());
    print!("{}", view.render());
    let ok = view.submit(&uploader, &session, &mut toasts).await;
    print_notices(&mut toasts);
    Ok(ok)
}

pub async fn subscribe(config: &AppConfig, species: &str, enable: bool) -> anyhow::Result<bool> {
    let session = open_session(config).await?;
    if !guard(Route::Notifications, &session) {
        return Ok(false);
    }
    let client = api_client(config)?;
    let mut toasts = Toasts::default();
    let mut view = NotificationsView::default();
    let ok = if enable {
        view.subscribe(&client, &session, species, &mut toasts).await
    } else {
        view.unsubscribe(&client, &session, species, &mut toasts).await
    };
    print_notices(&mut toasts);
    Ok(ok)
}

pub fn get_config_value(config: &AppConfig, key: &str) -> anyhow::Result<String> {
    let file_config = &config.file_config;
    let value = match key {
        "region" => file_config.region.clone(),
        "bucket-name" => file_config.bucket_name.clone(),
        "endpoint" => file_config.endpoint.clone().unwrap_or_default(),
        "api-url" => file_config.api_url.clone(),
        "client-id" => file_config.identity.client_id.clone(),
        "identity-endpoint" => file_config.identity_endpoint(),
        _ => anyhow::bail!("Invalid key: {} (expected one of {})", key, CONFIG_KEYS.join(", ")),
    };
    Ok(value)
}

pub fn set_config_value(config: &mut AppConfig, key: &str, value: &str) -> anyhow::Result<()> {
    let file_config = &mut config.file_config;
    let optional = if value.is_empty() { None } else { Some(value.to_string()) };
    match key {
        "region" => file_config.region = value.to_string(),
        "bucket-name" => file_config.bucket_name = value.to_string(),
        "endpoint" => file_config.endpoint = optional,
        "api-url" => file_config.api_url = value.trim_end_matches('/').to_string(),
        "client-id" => file_config.identity.client_id = value.to_string(),
        "identity-endpoint" => file_config.identity.endpoint = optional,
        _ => anyhow::bail!("Invalid key: {} (expected one of {})", key, CONFIG_KEYS.join(", ")),
    }
    config::write_file_config(&config.config_path, &config.file_config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_species_arg() {
        assert_eq!(parse_species_arg("wren").unwrap(), ("wren".to_string(), 1));
        assert_eq!(parse_species_arg("song thrush:3").unwrap(), ("song thrush".to_string(), 3));
        assert!(parse_species_arg("wren:0").is_err());
        assert!(parse_species_arg("wren:many").is_err());
        assert!(parse_species_arg(":2").is_err());
    }

    #[test]
    fn test_config_get_and_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::load(Some(dir.path().to_path_buf()), None).unwrap();
        set_config_value(&mut config, "api-url", "https://api.example/").unwrap();
        set_config_value(&mut config, "endpoint", "").unwrap();
        assert_eq!(get_config_value(&config, "api-url").unwrap(), "https://api.example");
        assert_eq!(get_config_value(&config, "endpoint").unwrap(), "");
        assert!(get_config_value(&config, "password").is_err());
        assert!(set_config_value(&mut config, "password", "x").is_err());

        let reloaded = AppConfig::load(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(reloaded.file_config.api_url, "https://api.example");
    }

    #[tokio::test]
    async fn test_offline_search_needs_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(dir.path().to_path_buf()), None).unwrap();
        let args = SearchArgs { offline: true, page: 1, ..Default::default() };
        assert!(search(&config, args).await.unwrap());
    }

    #[tokio::test]
    async fn test_guarded_commands_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(dir.path().to_path_buf()), None).unwrap();
        assert!(!whoami(&config).await.unwrap());
        assert!(!subscribe(&config, "wren", true).await.unwrap());
        assert!(logout(&config).await.unwrap());
    }
}
