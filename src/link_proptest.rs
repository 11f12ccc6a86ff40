//! Property-based tests for link parsing.
//!
//! Every generated link must normalize to a string that parses back to the
//! same link, with the same normalized form.

#[cfg(test)]
mod proptest_tests {
    use crate::link::ProjectLink;
    use proptest::prelude::*;

    fn name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,8}[a-z0-9]"
    }

    fn ref_suffix() -> impl Strategy<Value = String> {
        let ref_name = ("[A-Za-z0-9][A-Za-z0-9_-]{0,8}", prop::option::of("[a-z0-9]{1,5}"))
            .prop_map(|(head, tail)| match tail {
                Some(tail) => format!("{}/{}", head, tail),
                None => head,
            });
        prop::option::of((prop::sample::select(vec!["", "tag/", "branch/"]), ref_name))
            .prop_map(|part| match part {
                Some((kind, ref_name)) => format!("#ref={}{}", kind, ref_name),
                None => String::new(),
            })
    }

    fn segments(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,7}", 0..=max)
    }

    fn registry_link() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["registry:", "@"]),
            name(),
            segments(3),
            ref_suffix(),
        )
            .prop_map(|(prefix, name, path, suffix)| {
                let path: String = path.iter().map(|s| format!("/{}", s)).collect();
                format!("{}{}{}{}", prefix, name, path, suffix)
            })
    }

    fn dir_link() -> impl Strategy<Value = String> {
        segments(5).prop_map(|path| format!("dir:/{}", path.join("/")))
    }

    fn git_link() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!["https", "http", "ssh", "git"]),
            "[a-z]{1,8}\\.(com|org|io)",
            prop::option::of(1u16..9999),
            name(),
            name(),
            prop::bool::ANY,
            ref_suffix(),
            segments(2),
        )
            .prop_map(|(scheme, host, port, org, repo, dot_git, suffix, sub)| {
                let port = port.map(|p| format!(":{}", p)).unwrap_or_default();
                let repo = if dot_git { format!("{}.git", repo) } else { repo };
                let sub = if sub.is_empty() {
                    String::new()
                } else {
                    format!("&path={}", sub.join("/"))
                };
                format!("git:{}://{}{}/{}/{}{}{}", scheme, host, port, org, repo, suffix, sub)
            })
    }

    fn any_link() -> impl Strategy<Value = String> {
        prop_oneof![registry_link(), dir_link(), git_link()]
    }

    proptest! {
        /// Property: parse(normalize(parse(raw))) == parse(raw)
        #[test]
        fn normalization_is_idempotent(raw in any_link()) {
            let link = ProjectLink::parse(&raw).unwrap();
            let reparsed = ProjectLink::parse(&link.normalized).unwrap();
            prop_assert_eq!(&reparsed, &link);
            prop_assert_eq!(&reparsed.normalized, &link.normalized);
        }

        /// Property: the two registry prefixes are interchangeable
        #[test]
        fn registry_prefixes_agree(name in name(), suffix in ref_suffix()) {
            let long = ProjectLink::parse(&format!("registry:{}{}", name, suffix)).unwrap();
            let short = ProjectLink::parse(&format!("@{}{}", name, suffix)).unwrap();
            prop_assert_eq!(long.normalized, short.normalized);
        }

        /// Property: garbage without a known prefix never parses
        #[test]
        fn unknown_prefix_is_rejected(raw in "[a-z]{1,6}:[a-z/]{0,10}") {
            prop_assume!(!raw.starts_with("dir:") && !raw.starts_with("git:") && !raw.starts_with("registry:"));
            prop_assert!(ProjectLink::parse(&raw).is_err());
        }
    }
}
