use std::fmt::Write;

use crate::loader::{Entry, LoaderSnapshot};
use crate::normalize::{ItemKind, ListItem};

/// What a listing page should render for a given loader state.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    /// Tag/search page opened without a term.
    MissingQuery(String),
    Loading,
    /// Initial load failed with nothing to show; full-page error with a way back.
    Failed(String),
    Empty,
    Ready {
        items: Vec<Entry<T>>,
        loading_more: bool,
        /// Non-fatal error from a later page, shown below the items.
        notice: Option<String>,
        end_of_results: bool,
    },
}

impl<T> ViewState<T> {
    pub fn from_snapshot(snap: LoaderSnapshot<T>) -> Self {
        if let Some(msg) = snap.missing_query.clone() {
            return ViewState::MissingQuery(msg);
        }
        let has_more = snap.has_more();
        let notice = match snap.errors() {
            errs if errs.is_empty() => None,
            errs => Some(errs.join("; ")),
        };
        if snap.items.is_empty() {
            if !snap.started || snap.is_loading_initial {
                return ViewState::Loading;
            }
            return match notice {
                Some(msg) => ViewState::Failed(msg),
                None => ViewState::Empty,
            };
        }
        ViewState::Ready { items: snap.items, loading_more: snap.is_loading_more, notice, end_of_results: !has_more }
    }
}

/// Plain-text rendering used by the command-line front end.
pub fn render_text(title: &str, state: &ViewState<ListItem>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));
    match state {
        ViewState::MissingQuery(msg) => {
            let _ = writeln!(out, "{msg}");
        }
        ViewState::Loading => {
            let _ = writeln!(out, "Loading products...");
        }
        ViewState::Failed(msg) => {
            let _ = writeln!(out, "Error: {msg}");
            let _ = writeln!(out, "[Go back]");
        }
        ViewState::Empty => {
            let _ = writeln!(out, "No products found.");
        }
        ViewState::Ready { items, loading_more, notice, end_of_results } => {
            for entry in items {
                let _ = writeln!(out, "{}", render_item(&entry.item));
            }
            if *loading_more {
                let _ = writeln!(out, "Loading more...");
            }
            if let Some(n) = notice {
                let _ = writeln!(out, "! {n}");
            }
            if *end_of_results {
                let _ = writeln!(out, "-- End of results ({} items) --", items.len());
            }
        }
    }
    out
}

pub fn render_item(item: &ListItem) -> String {
    let badge = match item.kind {
        ItemKind::Streaming => "stream",
        ItemKind::Standard => "pack",
    };
    format!("[{badge}] {} ({}) #{}", item.title, item.category, item.id)
}
