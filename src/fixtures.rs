use crate::entities::{MediaItem, MediaKind, SpeciesCounts};

fn species(entries: &[(&str, u32)]) -> SpeciesCounts {
    entries.iter().map(|(name, count)| (*name, *count)).collect()
}

/// Sample collection shown by the browse view when no backend is reachable.
pub fn mock_media() -> Vec<MediaItem> {
    vec![
        MediaItem {
            id: 1,
            kind: MediaKind::Image,
            url: "https://images.unsplash.com/photo-1506744038136-46273834b3fb?auto=format&fit=facearea&w=400&q=80".to_string(),
            filename: "wren-in-bush.jpg".to_string(),
            species: species(&[("wren", 2)]),
            uploader: "Alice".to_string(),
            date: "2023-10-01".to_string(),
            file_url: None,
            thumb_url: None,
        },
        MediaItem {
            id: 2,
            kind: MediaKind::Audio,
            url: String::new(),
            filename: "song-thrush.mp3".to_string(),
            species: species(&[("song thrush", 1)]),
            uploader: "Bob".to_string(),
            date: "2023-09-15".to_string(),
            file_url: None,
            thumb_url: None,
        },
        MediaItem {
            id: 3,
            kind: MediaKind::Video,
            url: String::new(),
            filename: "raptor-flight.mp4".to_string(),
            species: species(&[("raptor", 1)]),
            uploader: "Carol".to_string(),
            date: "2023-08-20".to_string(),
            file_url: None,
            thumb_url: None,
        },
        MediaItem {
            id: 4,
            kind: MediaKind::Image,
            url: "https://images.unsplash.com/photo-1464983953574-0892a716854b?auto=format&fit=facearea&w=400&q=80".to_string(),
            filename: "majestic-eagle.png".to_string(),
            species: species(&[("eagle", 1), ("wren", 1)]),
            uploader: "Dave".to_string(),
            date: "2023-07-10".to_string(),
            file_url: None,
            thumb_url: None,
        },
    ]
}
