use spacesync::slug::{ensure_unique_slug_in_folder, normalize_slug};

/// Normalize `text`, then make it unique among `existing` when a parent is given.
pub(crate) fn suggest_slug(text: &str, parent: Option<&str>, existing: &[String]) -> String {
    let slug = normalize_slug(text);
    match parent {
        Some(parent) => ensure_unique_slug_in_folder(parent, &slug, existing),
        None => slug,
    }
}

pub(crate) fn handle_slug(
    text: &str,
    parent: Option<&str>,
    existing: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", suggest_slug(text, parent, existing));
    Ok(())
}
