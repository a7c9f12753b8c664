use crate::models::{RecommendationCriteria, TrackSummary};
use axum::response::Html;

/// Pages the handlers can render. Everything interpolated is escaped here.
pub enum View<'a> {
    Landing,
    Login {
        authorize_url: &'a str,
    },
    Dashboard {
        seeds: &'a [TrackSummary],
        tracks: &'a [TrackSummary],
    },
    RecommendForm,
    Results {
        criteria: &'a RecommendationCriteria,
        seeds: &'a [TrackSummary],
        tracks: &'a [TrackSummary],
    },
    Error {
        message: &'a str,
    },
}

pub fn render(view: View<'_>) -> Html<String> {
    let (title, body) = match view {
        View::Landing => (
            "Vibe Tuner",
            r#"<h1>Vibe Tuner</h1>
<p>Recommendations from your Spotify listening history, tuned to the sound you want.</p>
<p><a href="/login">Connect Spotify</a></p>"#
                .to_string(),
        ),
        View::Login { authorize_url } => (
            "Log in",
            format!(
                r#"<h1>Log in</h1>
<p>Authorize access to your top tracks to continue.</p>
<p><a class="button" href="{}">Log in with Spotify</a></p>"#,
                escape(authorize_url)
            ),
        ),
        View::Dashboard { seeds, tracks } => (
            "Dashboard",
            format!(
                r#"<h1>Your recommendations</h1>
<h2>Based on</h2>
{}
<h2>Try these</h2>
{}
<p><a href="/recommend">Tune your own</a> | <a href="/logout">Log out</a></p>"#,
                track_list(seeds),
                track_list(tracks)
            ),
        ),
        View::RecommendForm => ("Tune recommendations", recommend_form()),
        View::Results {
            criteria,
            seeds,
            tracks,
        } => (
            "Results",
            format!(
                r#"<h1>Tuned for {}</h1>
<p>energy {} / danceability {} / valence {} / acousticness {} / instrumentalness {} / popularity {} / tempo {}</p>
<h2>Seeded from</h2>
{}
<h2>Recommendations</h2>
{}
<p><a href="/recommend">Try again</a> | <a href="/dashboard">Dashboard</a></p>"#,
                escape(&criteria.genre),
                criteria.energy,
                criteria.danceability,
                criteria.valence,
                criteria.acousticness,
                criteria.instrumentalness,
                criteria.popularity,
                criteria.tempo,
                track_list(seeds),
                track_list(tracks)
            ),
        ),
        View::Error { message } => (
            "Something went wrong",
            format!(
                r#"<h1>Something went wrong</h1>
<p class="error">{}</p>
<p><a href="/">Home</a> | <a href="/login">Log in</a></p>"#,
                escape(message)
            ),
        ),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{}</title></head>
<body>
{}
</body>
</html>"#,
        title, body
    ))
}

fn track_list(tracks: &[TrackSummary]) -> String {
    if tracks.is_empty() {
        return "<p>No tracks found.</p>".to_string();
    }

    let items: String = tracks
        .iter()
        .map(|t| {
            format!(
                "<li class=\"track\" data-id=\"{}\">{} <span class=\"artists\">by {}</span></li>\n",
                escape(&t.id),
                escape(&t.name),
                escape(&t.artists.join(", "))
            )
        })
        .collect();

    format!("<ol>\n{}</ol>", items)
}

fn recommend_form() -> String {
    let slider = |name: &str, max: f64, step: f64, value: f64| {
        format!(
            r#"<label>{name} <input type="number" name="{name}" min="0" max="{max}" step="{step}" value="{value}" required></label><br>"#
        )
    };

    format!(
        r#"<h1>Tune recommendations</h1>
<form method="post" action="/recommend">
<label>genre <input type="text" name="genre" value="rock" pattern="[a-z0-9-]+" required></label><br>
{}
{}
{}
{}
{}
{}
{}
<button type="submit">Recommend</button>
</form>"#,
        slider("energy", 1.0, 0.01, 0.8),
        slider("danceability", 1.0, 0.01, 0.5),
        slider("valence", 1.0, 0.01, 0.5),
        slider("acousticness", 1.0, 0.01, 0.2),
        slider("instrumentalness", 1.0, 0.01, 0.1),
        slider("popularity", 100.0, 1.0, 50.0),
        slider("tempo", 250.0, 1.0, 120.0),
    )
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
