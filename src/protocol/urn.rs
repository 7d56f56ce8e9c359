//! Public identifier URNs.
//!
//! GENI names things with `urn:publicid:IDN+<authority>+<type>+<name>` URNs,
//! produced from a space-separated public identifier by the RFC 3151
//! transcription rules.

use std::fmt;

/// Prefix shared by every URN this aggregate issues.
pub const URN_PREFIX: &str = "urn:publicid:IDN";

/// Transcriptions applied in order. Escapes come first so that the
/// separators they introduce are not themselves rewritten.
const TRANSCRIPTIONS: &[(&str, &str)] = &[
    ("%", "%25"),
    (";", "%3B"),
    ("+", "%2B"),
    (" ", "+"),
    ("#", "%23"),
    ("?", "%3F"),
    ("'", "%27"),
    ("::", ";"),
    (":", "%3A"),
    ("//", ":"),
    ("/", "%2F"),
];

/// Transcribe a public identifier into URN form.
///
/// `"geni//gpo//gcf authority am"` becomes
/// `"urn:publicid:IDN+geni:gpo:gcf+authority+am"`. Runs of whitespace are
/// collapsed to a single separator.
pub fn publicid_to_urn(publicid: &str) -> String {
    let mut transcribed = publicid.split_whitespace().collect::<Vec<_>>().join(" ");
    for (from, to) in TRANSCRIPTIONS {
        transcribed = transcribed.replace(from, to);
    }
    format!("{}+{}", URN_PREFIX, transcribed)
}

/// A parsed GENI URN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urn {
    /// Naming authority, still in URN form (`geni:gpo:gcf`).
    pub authority: String,
    /// Object type (`slice`, `sliver`, `authority`, a resource type, ...).
    pub kind: String,
    /// Object name. May itself contain `+`.
    pub name: String,
}

impl Urn {
    /// Parse `urn:publicid:IDN+<authority>+<type>+<name>`.
    ///
    /// The prefix is matched case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        let prefix_len = URN_PREFIX.len();
        if input.len() <= prefix_len
            || !input.is_char_boundary(prefix_len)
            || !input[..prefix_len].eq_ignore_ascii_case(URN_PREFIX)
        {
            return None;
        }
        let rest = input[prefix_len..].strip_prefix('+')?;
        let mut parts = rest.splitn(3, '+');
        let authority = parts.next().filter(|s| !s.is_empty())?;
        let kind = parts.next().filter(|s| !s.is_empty())?;
        let name = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            authority: authority.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}+{}+{}", URN_PREFIX, self.authority, self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publicid_to_urn() {
        assert_eq!(
            publicid_to_urn("geni//gpo//gcf authority am"),
            "urn:publicid:IDN+geni:gpo:gcf+authority+am"
        );
        assert_eq!(
            publicid_to_urn("geni//gpo//gcf   fakevm\tabc"),
            "urn:publicid:IDN+geni:gpo:gcf+fakevm+abc"
        );
    }

    #[test]
    fn test_publicid_escapes() {
        assert_eq!(publicid_to_urn("a+b c"), "urn:publicid:IDN+a%2Bb+c");
        assert_eq!(publicid_to_urn("a::b x"), "urn:publicid:IDN+a;b+x");
        assert_eq!(publicid_to_urn("a:b/c x"), "urn:publicid:IDN+a%3Ab%2Fc+x");
        assert_eq!(publicid_to_urn("50% off?"), "urn:publicid:IDN+50%25+off%3F");
    }

    #[test]
    fn test_parse() {
        let urn = Urn::parse("urn:publicid:IDN+geni:gpo:gcf+slice+my+slice").unwrap();
        assert_eq!(urn.authority, "geni:gpo:gcf");
        assert_eq!(urn.kind, "slice");
        assert_eq!(urn.name, "my+slice");
        assert_eq!(urn.to_string(), "urn:publicid:IDN+geni:gpo:gcf+slice+my+slice");
    }

    #[test]
    fn test_parse_case_insensitive_prefix() {
        assert!(Urn::parse("URN:PUBLICID:IDN+a+sliver+b").is_some());
    }

    #[test]
    fn test_parse_rejects() {
        for bad in [
            "",
            "urn:publicid:IDN",
            "urn:publicid:IDN+",
            "urn:publicid:IDN+a+slice",
            "urn:publicid:IDN+a++b",
            "urn:other:IDN+a+slice+b",
            "slice",
        ] {
            assert!(Urn::parse(bad).is_none(), "accepted {:?}", bad);
        }
    }
}
