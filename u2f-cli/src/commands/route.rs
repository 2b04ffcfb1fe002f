//! Route command implementation.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use u2f_core::RouteState;

use crate::utils;

/// Execute the route command.
pub fn execute(fragment: &str, json: bool) -> Result<()> {
    let mut state = RouteState::default();
    let rewritten = state.apply(fragment);

    let route = state.route();

    if json {
        return utils::print_json(&json!({
            "route": route,
            "fragment": state.displayed_fragment(),
            "rewritten": rewritten,
            "view": route.active_view(),
            "nav": route.nav_items(),
        }));
    }

    println!("   {} {}", "Route:".dimmed(), route);
    println!("   {} #{}", "Fragment:".dimmed(), state.displayed_fragment());
    println!("   {} {:?}", "View:".dimmed(), route.active_view());
    if rewritten {
        println!(
            "   {} `{}` is not addressable and was cleared",
            "Note:".yellow(),
            fragment
        );
    }
    Ok(())
}
