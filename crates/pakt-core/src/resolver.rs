//! Framework compatibility resolution.
//!
//! Given the framework a project targets and the frameworks a package ships
//! assets for, pick the single nearest compatible one:
//!
//! 1. A candidate is compatible when it is `Any`, or it has the project's
//!    family, a version no greater than the project's, and either no
//!    profile, the project's profile, or the project has no profile.
//! 2. Among compatible specific candidates the greatest version wins. Equal
//!    versions prefer an exact profile match, then a profile-less candidate.
//! 3. `Any` is chosen only when no specific candidate is compatible.
//! 4. Remaining ties go to the first candidate in input order.
//!
//! No compatible candidate is `None`, not an error. A matched group with no
//! items is still a match: it means the package needs nothing of that kind
//! for this framework.

use pakt_schema::{AssetGroup, Framework, FrameworkName};

/// Returns `true` if assets built for `candidate` can be used by a project
/// targeting `target`.
pub fn is_compatible(target: &Framework, candidate: &Framework) -> bool {
    match (target, candidate) {
        (_, Framework::Any) => true,
        (Framework::Specific(target), Framework::Specific(candidate)) => {
            names_compatible(target, candidate)
        }
        _ => false,
    }
}

fn names_compatible(target: &FrameworkName, candidate: &FrameworkName) -> bool {
    target.family().eq_ignore_ascii_case(candidate.family())
        && candidate.version() <= target.version()
        && match (target.profile(), candidate.profile()) {
            (_, None) | (None, _) => true,
            (Some(t), Some(c)) => t == c,
        }
}

/// Tie-break rank among compatible candidates of equal version.
fn profile_rank(target: &FrameworkName, candidate: &FrameworkName) -> u8 {
    if candidate.profile() == target.profile() {
        2
    } else if candidate.profile().is_none() {
        1
    } else {
        0
    }
}

/// Index of the nearest compatible framework in `candidates`.
fn nearest_index<'a, I>(target: &Framework, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a Framework>,
{
    let mut best: Option<(usize, &FrameworkName)> = None;
    let mut first_any = None;

    for (index, candidate) in candidates.into_iter().enumerate() {
        match candidate {
            Framework::Any => {
                first_any.get_or_insert(index);
            }
            Framework::Specific(name) if is_compatible(target, candidate) => {
                let Framework::Specific(target_name) = target else {
                    continue;
                };
                let better = best.is_none_or(|(_, current)| {
                    (name.version(), profile_rank(target_name, name))
                        > (current.version(), profile_rank(target_name, current))
                });
                if better {
                    best = Some((index, name));
                }
            }
            _ => {}
        }
    }

    best.map(|(index, _)| index).or(first_any)
}

/// The nearest framework in `frameworks` compatible with `target`.
pub fn get_nearest<'a>(target: &Framework, frameworks: &'a [Framework]) -> Option<&'a Framework> {
    nearest_index(target, frameworks).map(|i| &frameworks[i])
}

/// The asset group whose framework is nearest to `target`, if any applies.
pub fn pick_best_group<'a>(target: &Framework, groups: &'a [AssetGroup]) -> Option<&'a AssetGroup> {
    let picked = nearest_index(target, groups.iter().map(AssetGroup::framework)).map(|i| &groups[i]);
    tracing::trace!(
        %target,
        candidates = groups.len(),
        picked = ?picked.map(|g| g.framework().to_string()),
        "resolved asset group"
    );
    picked
}

/// A resolved group is usable when it matched, even with zero items.
pub fn is_usable(group: Option<&AssetGroup>) -> bool {
    group.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(framework: &str, items: &[&str]) -> AssetGroup {
        AssetGroup::new(
            Framework::parse(framework),
            items.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    #[test]
    fn picks_nearest_lower_version() {
        let groups = vec![
            group("net20", &["lib/net20/A.dll"]),
            group("net45", &["lib/net45/A.dll"]),
            group("net461", &["lib/net461/A.dll"]),
        ];
        let picked = pick_best_group(&Framework::parse("net46"), &groups).unwrap();
        assert_eq!(picked.items(), ["lib/net45/A.dll"]);
    }

    #[test]
    fn exact_version_wins() {
        let groups = vec![group("net40", &["a"]), group("net45", &["b"])];
        let picked = pick_best_group(&Framework::parse("net45"), &groups).unwrap();
        assert_eq!(picked.items(), ["b"]);
    }

    #[test]
    fn any_is_fallback_only() {
        let groups = vec![group("", &["lib/A.dll"]), group("net40", &["lib/net40/A.dll"])];
        let picked = pick_best_group(&Framework::parse("net45"), &groups).unwrap();
        assert_eq!(picked.items(), ["lib/net40/A.dll"]);

        let picked = pick_best_group(&Framework::parse("sl5"), &groups).unwrap();
        assert!(picked.framework().is_any());
    }

    #[test]
    fn no_compatible_candidate_is_none() {
        let groups = vec![group("net45", &["a"]), group("sl5", &["b"])];
        assert!(pick_best_group(&Framework::parse("net40"), &groups).is_none());
        assert!(pick_best_group(&Framework::parse("netstandard2.0"), &groups).is_none());
        assert!(pick_best_group(&Framework::parse("net45"), &[]).is_none());
    }

    #[test]
    fn empty_group_is_a_match() {
        let groups = vec![group("net45", &[]), group("net20", &["lib/net20/A.dll"])];
        let picked = pick_best_group(&Framework::parse("net46"), &groups);
        assert!(is_usable(picked));
        assert!(picked.unwrap().is_empty());
        assert!(!is_usable(None));
    }

    #[test]
    fn duplicates_keep_input_order() {
        let groups = vec![group("net45", &["first"]), group("net45", &["second"])];
        let picked = pick_best_group(&Framework::parse("net46"), &groups).unwrap();
        assert_eq!(picked.items(), ["first"]);
    }

    #[test]
    fn profiles_prefer_exact_then_none() {
        let groups = vec![
            group("net40", &["full"]),
            group("net40-client", &["client"]),
        ];
        let client = pick_best_group(&Framework::parse("net40-client"), &groups).unwrap();
        assert_eq!(client.items(), ["client"]);

        let full = pick_best_group(&Framework::parse("net40"), &groups).unwrap();
        assert_eq!(full.items(), ["full"]);
    }

    #[test]
    fn mismatched_profile_is_incompatible() {
        assert!(!is_compatible(
            &Framework::parse("net40-client"),
            &Framework::parse("net40-full")
        ));
        assert!(is_compatible(
            &Framework::parse("net40"),
            &Framework::parse("net40-client")
        ));
    }

    #[test]
    fn unsupported_never_matches() {
        let groups = vec![AssetGroup::new(
            Framework::Unsupported("foo".into()),
            vec!["x".into()],
        )];
        assert!(pick_best_group(&Framework::parse("net45"), &groups).is_none());
        assert!(!is_compatible(&Framework::Unsupported("foo".into()), &Framework::parse("net45")));
    }

    #[test]
    fn get_nearest_returns_framework() {
        let frameworks = vec![
            Framework::parse("net35"),
            Framework::parse("net40"),
            Framework::Any,
        ];
        assert_eq!(
            get_nearest(&Framework::parse("net45"), &frameworks),
            Some(&Framework::parse("net40"))
        );
        assert_eq!(
            get_nearest(&Framework::parse("net20"), &frameworks),
            Some(&Framework::Any)
        );
    }

    #[test]
    fn chosen_group_is_never_dominated() {
        let targets = ["net20", "net35", "net40", "net40-client", "net45", "net46", "sl5"];
        let groups = vec![
            group("net35", &["a"]),
            group("net40-client", &["b"]),
            group("net45", &["c"]),
            group("sl4", &["d"]),
            group("any", &["e"]),
        ];
        for target in targets {
            let target = Framework::parse(target);
            let Some(picked) = pick_best_group(&target, &groups) else {
                continue;
            };
            assert!(is_compatible(&target, picked.framework()));
            let (Some(picked_name), Some(target_name)) = (picked.framework().name(), target.name())
            else {
                continue;
            };
            for other in &groups {
                if let (true, Some(name)) = (is_compatible(&target, other.framework()), other.framework().name()) {
                    assert!(
                        (name.version(), profile_rank(target_name, name))
                            <= (picked_name.version(), profile_rank(target_name, picked_name)),
                        "{target}: {} beats {}",
                        other.framework(),
                        picked.framework()
                    );
                }
            }
        }
    }
}
