//! Plain-text rendering of discovery state for the terminal.

use leadscout_core::{DiscoveryView, NoticeKind, Phase, UnlockOutcome};
use leadscout_types::{Contact, HistoryEntry, PreviewItem, PreviewPage};
use std::fmt::Write;

const MASK: &str = "•••••••";

pub fn render_item(index: usize, item: &PreviewItem) -> String {
    let mut out = format!("{:>3}. {}", index, item.title);
    if let Some(category) = item.category.as_deref() {
        let _ = write!(out, " ({})", category);
    }
    if let Some(rating) = item.rating {
        let _ = write!(out, "  ★ {:.1}", rating);
        if let Some(reviews) = item.review_count {
            let _ = write!(out, " [{}]", reviews);
        }
    }
    if let Some(address) = item.display_address() {
        let _ = write!(out, "\n     {}", address);
    }

    match item.contact() {
        Contact::Masked => {
            let _ = write!(out, "\n     phone {MASK}  website {MASK}  (locked)");
        }
        Contact::Revealed {
            phone,
            website,
            email,
        } => {
            let _ = write!(
                out,
                "\n     phone {}  website {}",
                phone.unwrap_or("-"),
                website.unwrap_or("-")
            );
            if let Some(email) = email {
                let _ = write!(out, "  email {}", email);
            }
        }
    }
    out
}

pub fn render_page(page: &PreviewPage) -> String {
    let p = &page.pagination;
    let offset = (p.page.max(1) as usize - 1) * p.per_page as usize;
    let mut out = String::new();
    for (i, item) in page.items.iter().enumerate() {
        out.push_str(&render_item(offset + i + 1, item));
        out.push('\n');
    }
    if page.items.is_empty() {
        out.push_str("No results on this page.\n");
    }
    let _ = writeln!(
        out,
        "Page {} of {} ({} results)",
        p.page,
        p.total_pages.max(1),
        p.total_items
    );
    out
}

pub fn render_view(view: &DiscoveryView) -> String {
    let mut out = String::new();

    if let Some(session) = &view.session {
        let _ = writeln!(
            out,
            "#{} {} in {} [{}]",
            session.id, session.query_text, session.location_text, session.status
        );
    }

    match view.phase {
        Phase::Idle | Phase::FormInput | Phase::Submitting => {
            if view.form.is_blank() {
                out.push_str("Enter keywords and a location to start a search.\n");
            } else {
                let _ = writeln!(out, "Search: {}", view.form.keywords);
            }
        }
        Phase::Polling => {
            let progress = view.session.as_ref().map(|s| s.progress).unwrap_or(0.0);
            let found = view.session.as_ref().map(|s| s.unique_records).unwrap_or(0);
            let _ = writeln!(out, "Searching... {:.0}% ({} found so far)", progress, found);
        }
        Phase::PreviewReady => {
            if let Some(session) = &view.session {
                let _ = writeln!(
                    out,
                    "{} found, {} unlocked, {} available, {} credits",
                    session.unique_records,
                    session.unlocked_count,
                    session.available_to_unlock(),
                    session.credits_balance
                );
            }
            if let Some(page) = &view.preview {
                out.push_str(&render_page(page));
            }
            match (view.unlock_enabled, view.default_batch, &view.session) {
                (true, Some(batch), _) => {
                    let _ = writeln!(out, "Unlock next {} leads for {} credits.", batch, batch);
                }
                (false, Some(_), _) => out.push_str("An unlock is in progress.\n"),
                (_, None, Some(session)) if session.available_to_unlock() == 0 => {
                    out.push_str("No leads left to unlock.\n");
                }
                (_, None, Some(session)) => {
                    let _ = writeln!(
                        out,
                        "Not enough credits to unlock more leads ({} credits).",
                        session.credits_balance
                    );
                }
                _ => {}
            }
            if view.background_search {
                out.push_str("Searching for more leads in the background.\n");
            }
        }
        Phase::Failed => {}
    }

    if let Some(notice) = &view.notice {
        let tag = match notice.kind {
            NoticeKind::Progress => "..",
            NoticeKind::Success => "ok",
            NoticeKind::Warning => "!!",
        };
        let _ = writeln!(out, "[{}] {}", tag, notice.text);
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {}", error);
    }
    out
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No searches found.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "#{:<6} {:<10} {} in {}  {} found, {} unlocked, {} available  ({})",
            entry.search_id,
            entry.status,
            entry.query_text,
            entry.location_text,
            entry.unique_records,
            entry.unlocked_count,
            entry.available_to_unlock,
            entry.last_accessed_at.format("%Y-%m-%d %H:%M")
        );
    }
    out
}

pub fn render_outcome(outcome: &UnlockOutcome) -> String {
    let mut out = format!(
        "Unlocked {} leads for {} credits. {} credits remaining.\n",
        outcome.unlocked, outcome.credits_used, outcome.credits_remaining
    );
    if outcome.deepening.is_some() {
        match outcome.new_max_places {
            Some(n) => {
                let _ = writeln!(out, "Searching for up to {} more businesses in the background.", n);
            }
            None => out.push_str("Searching for more businesses in the background.\n"),
        }
    }
    out
}
