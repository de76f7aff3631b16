//! Route lookup.
//!
//! # Responsibilities
//! - Look up the entry list for the request method
//! - Return the first entry whose template matches the request path
//! - Return `None` so the caller falls back to the default upstream
//!
//! # Design Decisions
//! - Immutable table, no locks on the lookup path
//! - First match wins: declaration order is the tie-break, so more specific
//!   routes must be declared first
//! - A matched entry is returned even when it is not a debug route; it still
//!   shadows later entries for the same request

use axum::http::Method;

use crate::routing::table::{RouteEntry, RouteTable};

impl RouteTable {
    /// Find the entry serving `method` + `raw_path`.
    ///
    /// `raw_path` may carry a query string; it is ignored for matching.
    pub fn match_route(&self, method: &Method, raw_path: &str) -> Option<&RouteEntry> {
        let path = raw_path.split_once('?').map_or(raw_path, |(path, _)| path);
        let path = path.strip_prefix('/').unwrap_or(path);

        self.routes(method)
            .iter()
            .find(|route| route.template().matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        let mut table = RouteTable::empty();
        table.add_route(Method::GET, "http/", "bears/{bearId}", 5999, true);
        table.add_route(Method::GET, "", "kittens/{kittenId}", 6000, false);
        table.add_route(Method::GET, "", "kittens/{kittenId}/toys", 6000, true);
        table.add_route(Method::GET, "", "{anything}/{id}", 7000, true);
        table.add_route(Method::POST, "", "bears", 5999, true);
        table
    }

    #[test]
    fn matches_by_method_and_path() {
        let table = table();
        let route = table.match_route(&Method::GET, "/bears/00").unwrap();
        assert_eq!(route.port, 5999);
        assert_eq!(route.path_prefix, "http/");

        assert!(table.match_route(&Method::POST, "/bears/00").is_none());
        assert_eq!(table.match_route(&Method::POST, "/bears").unwrap().port, 5999);
    }

    #[test]
    fn unknown_method_never_matches() {
        assert!(table().match_route(&Method::PATCH, "/bears/00").is_none());
    }

    #[test]
    fn unmatched_path_is_none() {
        assert!(table().match_route(&Method::GET, "/fake").is_none());
    }

    #[test]
    fn query_string_is_ignored() {
        let table = table();
        let route = table.match_route(&Method::GET, "/bears/00?claws=sharp").unwrap();
        assert_eq!(route.path_pattern, "bears/{bearId}");
    }

    #[test]
    fn first_match_wins_and_non_debug_match_shadows() {
        let table = table();
        // `kittens/{kittenId}` is not a debug route but is declared before the
        // catch-all, so the catch-all never sees this request.
        let route = table.match_route(&Method::GET, "/kittens/11").unwrap();
        assert_eq!(route.path_pattern, "kittens/{kittenId}");
        assert!(!route.debug);

        let route = table.match_route(&Method::GET, "/turtles/33").unwrap();
        assert_eq!(route.path_pattern, "{anything}/{id}");
    }
}
