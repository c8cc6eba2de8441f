//! HTML overview of the current ranking

use crate::cycle::SnapshotView;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Html};
use starterpack_common::models::{ScoredAccount, Snapshot};
use std::fmt::Write;

const PODIUM_SIZE: usize = 3;
const MEDAL_COLORS: [&str; PODIUM_SIZE] = ["bg-yellow-400", "bg-gray-400", "bg-yellow-700"];

/// Top accounts as cards, or an error page while no ranking exists
pub async fn index(State(state): State<AppState>) -> (StatusCode, Html<String>) {
    match state.controller.view().await {
        SnapshotView::Ready(snapshot) => (
            StatusCode::OK,
            Html(render_page(&snapshot, &state.config.pack.seed_handle)),
        ),
        SnapshotView::NotInitialized | SnapshotView::Initializing => {
            (StatusCode::SERVICE_UNAVAILABLE, Html(render_error()))
        }
    }
}

pub fn render_page(snapshot: &Snapshot, seed: &str) -> String {
    let mut cards = String::new();
    for (i, account) in snapshot.users.iter().take(PODIUM_SIZE).enumerate() {
        render_card(&mut cards, i, account);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <script src="https://cdn.tailwindcss.com"></script>
  </head>
  <body class="bg-gray-100 min-h-screen">
    <div class="container mx-auto px-4 py-8">
      <header class="text-center mb-12">
        <h1 class="text-4xl font-bold text-gray-900 mb-2">{title}</h1>
        <p class="text-gray-600">Based on @{seed}'s network</p>
      </header>
      <div class="flex flex-wrap justify-center gap-8 mb-12">
{cards}      </div>
      <div class="text-center">
        <a href="/api/starter-pack" class="inline-block bg-blue-500 hover:bg-blue-700 text-white font-bold py-3 px-6 rounded-lg shadow-lg">View Full Rankings</a>
        <p class="mt-4 text-gray-600">Last updated: {updated}</p>
      </div>
    </div>
  </body>
</html>
"#,
        title = escape_html(&snapshot.name),
        seed = escape_html(seed),
        cards = cards,
        updated = snapshot.last_updated.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn render_card(out: &mut String, position: usize, account: &ScoredAccount) {
    let metrics = &account.metrics;
    let description = if metrics.description.is_empty() {
        "No description"
    } else {
        &metrics.description
    };

    // Writing into a String cannot fail
    let _ = write!(
        out,
        r#"        <div class="bg-white rounded-lg shadow-lg p-6 w-full max-w-sm relative">
          <div class="absolute -top-4 -right-4 w-12 h-12 {medal} rounded-full flex items-center justify-center text-white text-xl font-bold">{rank}</div>
          <div class="text-center">
            <h2 class="text-xl font-bold text-gray-900 mb-2">{name}</h2>
            <a href="https://bsky.app/profile/{handle}" target="_blank" class="text-blue-500 hover:text-blue-700 mb-4 inline-block">@{handle}</a>
            <p class="text-gray-600 mb-4">{description}</p>
          </div>
          <div class="grid grid-cols-2 gap-4 text-center mb-4">
            <div class="bg-gray-50 rounded-lg p-3"><p class="text-gray-600 text-sm">Followers</p><p class="text-2xl font-bold">{followers}</p></div>
            <div class="bg-gray-50 rounded-lg p-3"><p class="text-gray-600 text-sm">Posts</p><p class="text-2xl font-bold">{posts}</p></div>
          </div>
          <div class="space-y-2">
            <div class="flex justify-between p-2"><span class="text-gray-600">Follower Score</span><span class="font-bold">{follower_score:.1}</span></div>
            <div class="flex justify-between p-2"><span class="text-gray-600">Posts Score</span><span class="font-bold">{posting_score:.1}</span></div>
            <div class="flex justify-between p-2"><span class="text-gray-600">Interactions Score</span><span class="font-bold">{engagement_score:.1}</span></div>
            <div class="flex justify-between p-2 bg-blue-50 rounded-lg"><span class="font-bold">Total Score</span><span class="text-xl font-bold text-blue-600">{score:.1}</span></div>
          </div>
        </div>
"#,
        medal = MEDAL_COLORS[position % PODIUM_SIZE],
        rank = position + 1,
        name = escape_html(&metrics.display_name),
        handle = escape_html(&metrics.handle),
        description = escape_html(description),
        followers = format_count(metrics.follower_count),
        posts = format_count(metrics.post_count),
        follower_score = account.follower_score,
        posting_score = account.posting_score,
        engagement_score = account.engagement_score,
        score = account.score,
    );
}

pub fn render_error() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Error - Top Tech Voices</title>
    <script src="https://cdn.tailwindcss.com"></script>
  </head>
  <body class="bg-gray-100 min-h-screen flex items-center justify-center">
    <div class="text-center">
      <h1 class="text-2xl font-bold text-red-600 mb-4">Error Loading Rankings</h1>
      <p class="text-gray-600">Please try again later</p>
      <button onclick="location.reload()" class="mt-4 bg-blue-500 hover:bg-blue-700 text-white font-bold py-2 px-4 rounded">Retry</button>
    </div>
  </body>
</html>
"#
    .to_string()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Grouped digits up to 10 000, compact notation (`12.3K`, `1.5M`) above
pub fn format_count(n: u64) -> String {
    if n <= 10_000 {
        return group_thousands(n);
    }

    const UNITS: [(f64, &str); 4] = [(1e3, "K"), (1e6, "M"), (1e9, "B"), (1e12, "T")];
    let mut unit = 0;
    while unit + 1 < UNITS.len() && n as f64 >= UNITS[unit + 1].0 {
        unit += 1;
    }

    let mut scaled = (n as f64 / UNITS[unit].0 * 10.0).round() / 10.0;
    if scaled >= 1000.0 && unit + 1 < UNITS.len() {
        unit += 1;
        scaled = (n as f64 / UNITS[unit].0 * 10.0).round() / 10.0;
    }

    let digits = if scaled.fract() == 0.0 {
        format!("{}", scaled as u64)
    } else {
        format!("{:.1}", scaled)
    };
    format!("{}{}", digits, UNITS[unit].1)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
