//! Fragment-identifier routing.
//!
//! The page knows three routes. Only `#reg` and `#sig` are addressable; every
//! other fragment (including `#about` and the empty fragment) lands on the
//! about route and the displayed fragment is cleared.

use serde::{Deserialize, Serialize};

/// Page route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    #[default]
    About,
    Registration,
    Signing,
}

/// Which form a route renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveView {
    RegistrationForm,
    SigningForm,
}

/// Navigation bar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub route: Route,
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
}

impl Route {
    /// Routes reachable from the navigation bar, in display order.
    pub const NAV: [Route; 2] = [Route::Registration, Route::Signing];

    /// Resolve a fragment (with or without the leading `#`).
    pub fn from_fragment(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        match fragment {
            "reg" => Self::Registration,
            "sig" => Self::Signing,
            _ => Self::About,
        }
    }

    /// The fragment displayed while this route is active.
    pub fn fragment(self) -> &'static str {
        match self {
            Self::About => "",
            Self::Registration => "reg",
            Self::Signing => "sig",
        }
    }

    /// The landing route has no content of its own and shows the
    /// registration form.
    pub fn active_view(self) -> ActiveView {
        match self {
            Self::Signing => ActiveView::SigningForm,
            Self::About | Self::Registration => ActiveView::RegistrationForm,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::About => "About",
            Self::Registration => "Registration",
            Self::Signing => "Signing",
        }
    }

    /// Navigation entries with the current route highlighted.
    pub fn nav_items(self) -> Vec<NavItem> {
        Self::NAV
            .iter()
            .map(|&route| NavItem {
                route,
                label: route.label(),
                href: match route {
                    Self::Registration => "#reg",
                    Self::Signing => "#sig",
                    Self::About => "#",
                },
                active: route == self,
            })
            .collect()
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Current route plus the fragment shown in the address bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteState {
    route: Route,
    displayed_fragment: String,
}

impl RouteState {
    pub fn route(&self) -> Route {
        self.route
    }

    pub fn displayed_fragment(&self) -> &str {
        &self.displayed_fragment
    }

    /// Apply a fragment from the initial load or a hash-change event.
    ///
    /// Returns `true` when the incoming fragment is not the one displayed
    /// afterwards, so the host must rewrite its address bar. Applying the
    /// displayed fragment again changes nothing and returns `false`.
    pub fn apply(&mut self, fragment: &str) -> bool {
        let requested = fragment.strip_prefix('#').unwrap_or(fragment);
        let route = Route::from_fragment(fragment);

        self.route = route;
        if self.displayed_fragment != route.fragment() {
            self.displayed_fragment = route.fragment().to_string();
        }
        requested != route.fragment()
    }
}
