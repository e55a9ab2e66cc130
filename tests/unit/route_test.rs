use linkdock::types::bookmark::ViewMode;
use linkdock::types::route::RouteState;

#[test]
fn test_defaults() {
    let route = RouteState::from_query("");
    assert_eq!(route.page, 1);
    assert_eq!(route.view, ViewMode::Grid);
}

#[test]
fn test_parses_page_and_view() {
    let route = RouteState::from_query("page=3&view=list");
    assert_eq!(route.page, 3);
    assert_eq!(route.view, ViewMode::List);
}

#[test]
fn test_invalid_values_fall_back() {
    let route = RouteState::from_query("page=0&view=mosaic");
    assert_eq!(route.page, 1);
    assert_eq!(route.view, ViewMode::Grid);

    let route = RouteState::from_query("page=-2&view=");
    assert_eq!(route.page, 1);
    assert_eq!(route.view, ViewMode::Grid);
}

#[test]
fn test_unknown_params_ignored() {
    let route = RouteState::from_query("utm_source=x&page=2");
    assert_eq!(route.page, 2);
}

#[test]
fn test_page_omitted_when_first() {
    let route = RouteState {
        page: 1,
        view: ViewMode::Grid,
    };
    assert_eq!(route.to_query(), "view=grid");
}

#[test]
fn test_serializes_page_past_first() {
    let route = RouteState {
        page: 4,
        view: ViewMode::List,
    };
    assert_eq!(route.to_query(), "page=4&view=list");
}

#[test]
fn test_round_trip() {
    let route = RouteState {
        page: 7,
        view: ViewMode::List,
    };
    assert_eq!(RouteState::from_query(&route.to_query()), route);

    let first = RouteState::default();
    assert_eq!(RouteState::from_query(&first.to_query()), first);
}
