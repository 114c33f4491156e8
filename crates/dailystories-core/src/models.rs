use chrono::SecondsFormat;
use dailystories_api::Story;
use dailystories_cache::SavedStory;

/// Convert a feed story into what the bookmark store keeps
pub fn story_to_saved(story: &Story) -> SavedStory {
    SavedStory {
        id: story.id.clone(),
        name: story.name.clone(),
        description: story.description.clone(),
        photo_url: story.photo_url.clone(),
        created_at: story.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        lat: story.lat,
        lon: story.lon,
    }
}

/// The bookmark store returns stories unordered; the saved list shows the
/// newest first.
pub fn sort_newest_first(stories: &mut [SavedStory]) {
    stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
