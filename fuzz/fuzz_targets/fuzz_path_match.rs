#![no_main]

use arbitrary::Arbitrary;
use fundle_router::{MemoryHistory, QueryParams, Router, match_path, split_query};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct RouteCase {
    patterns: Vec<String>,
    path: String,
}

fuzz_target!(|case: RouteCase| {
    let (bare, query) = split_query(&case.path);
    let parsed = QueryParams::parse(query);
    assert_eq!(QueryParams::parse(&parsed.to_string()), parsed);

    for pattern in &case.patterns {
        if let Some(found) = match_path(&case.path, pattern) {
            // Every named segment binds exactly one non-empty path segment.
            assert!(found.params.values().all(|v| !v.is_empty() && !v.contains('/')));
            assert!(match_path(bare, pattern).is_some());
        }
    }

    let router = Router::new(MemoryHistory::default());
    for pattern in &case.patterns {
        router.route(pattern.clone(), |_, _| {});
    }
    let _ = router.navigate(&case.path);
});
