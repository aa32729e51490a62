/// Query parameters that make a link refer to a whole playlist.
const PLAYLIST_MARKERS: [&str; 2] = ["?list=", "&list="];

pub fn is_playlist(link: &str) -> bool {
    PLAYLIST_MARKERS.iter().any(|marker| link.contains(marker))
}

/// The links captured for one batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkList(Vec<String>);

impl LinkList {
    /// Splits free text on whitespace, dropping empty tokens.
    pub fn parse(input: &str) -> Self {
        Self(input.split_whitespace().map(str::to_string).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for LinkList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|link: &String| !link.trim().is_empty())
                .collect()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_discards_blanks() {
        let links = LinkList::parse("  https://v/1   https://v/2\n\n\thttps://v/3 \n");
        assert_eq!(links.as_slice(), &["https://v/1", "https://v/2", "https://v/3"]);
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn test_parse_blank_input() {
        assert!(LinkList::parse("").is_empty());
        assert!(LinkList::parse(" \n \t ").is_empty());
    }

    #[test]
    fn test_from_iter_skips_blank_entries() {
        let links: LinkList = vec!["https://v/1", " ", ""].into_iter().collect();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_playlist_marker() {
        assert!(is_playlist("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist("https://www.youtube.com/watch?v=abc&list=PL123"));
        assert!(!is_playlist("https://www.youtube.com/watch?v=abc"));
        assert!(!is_playlist("https://example.com/wishlist=1"));
    }
}
