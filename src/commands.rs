//! User commands understood by the meme sender.

/// Aliases for listing the known emotion tags.
const LIST_ALIASES: &[&str] = &["/表情列表", "/memes"];
/// Aliases for opening an upload session.
const UPLOAD_ALIASES: &[&str] = &["/上传表情", "/upload"];
/// Aliases for reloading the emotion map file.
const RELOAD_ALIASES: &[&str] = &["/重载表情", "/reload"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListCategories,
    /// Start an upload session; the argument is the display tag, if given.
    StartUpload(Option<String>),
    ReloadEmotions,
}

impl Command {
    /// Parse a message text. Returns `None` for anything that is not one of
    /// our commands.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(2, char::is_whitespace);
        let head = parts.next()?;
        let arg = parts
            .next()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);

        if LIST_ALIASES.contains(&head) {
            Some(Self::ListCategories)
        } else if UPLOAD_ALIASES.contains(&head) {
            Some(Self::StartUpload(arg))
        } else if RELOAD_ALIASES.contains(&head) {
            Some(Self::ReloadEmotions)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list() {
        assert_eq!(Command::parse("/表情列表"), Some(Command::ListCategories));
        assert_eq!(Command::parse("  /memes  "), Some(Command::ListCategories));
    }

    #[test]
    fn parses_upload_with_and_without_argument() {
        assert_eq!(
            Command::parse("/上传表情 开心"),
            Some(Command::StartUpload(Some("开心".into())))
        );
        assert_eq!(
            Command::parse("/upload   开心  "),
            Some(Command::StartUpload(Some("开心".into())))
        );
        assert_eq!(Command::parse("/upload"), Some(Command::StartUpload(None)));
    }

    #[test]
    fn parses_reload() {
        assert_eq!(Command::parse("/reload"), Some(Command::ReloadEmotions));
    }

    #[test]
    fn ignores_other_text() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse("/uploads 开心"), None);
        assert_eq!(Command::parse(""), None);
    }
}
