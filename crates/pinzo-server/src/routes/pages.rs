//! Server-rendered screens. Live updates come from `/ws/changes`.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};

use pinzo_proto::{Record, RecordDraft};

use super::bookmarks::parse_id;
use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::state::AppState;

const HEAD: &str = "<!doctype html>\n<html><head><title>Pinzo</title></head><body>\n";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(sign_in_screen))
        .route("/dashboard", get(dashboard_screen))
        .route("/dashboard/bookmarks", post(create_from_form))
        .route(
            "/dashboard/bookmarks/:id/delete",
            get(confirm_delete_screen).post(delete_from_form),
        )
}

async fn sign_in_screen() -> Html<&'static str> {
    Html(concat!(
        "<!doctype html>\n<html><head><title>Pinzo</title></head><body>\n",
        "<h1>Pinzo</h1>\n<p>Your bookmarks, on every open tab.</p>\n",
        "<a href=\"/auth/sign-in\">Sign in</a>\n",
        "</body></html>\n"
    ))
}

async fn dashboard_screen(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Html<String>> {
    let bookmarks = state.store.list_by_owner(&identity.owner_id).await?;

    let who = identity
        .name
        .as_deref()
        .or(identity.email.as_deref())
        .unwrap_or(identity.owner_id.as_str());

    let mut page = String::from(HEAD);
    if let Some(avatar) = &identity.avatar_url {
        page.push_str(&format!(
            "<img id=\"avatar\" src=\"{}\" alt=\"\" width=\"32\" height=\"32\">\n",
            escape(avatar)
        ));
    }
    page.push_str(&format!("<h1>Bookmarks of {}</h1>\n", escape(who)));
    page.push_str(concat!(
        "<form method=\"post\" action=\"/auth/sign-out\">",
        "<button>Sign out</button></form>\n",
    ));
    page.push_str(concat!(
        "<form id=\"create\" method=\"post\" action=\"/dashboard/bookmarks\">\n",
        "<input name=\"title\" placeholder=\"Title\" required>\n",
        "<input name=\"url\" type=\"url\" placeholder=\"https://\" required>\n",
        "<button>Add bookmark</button>\n</form>\n",
    ));

    if bookmarks.is_empty() {
        page.push_str("<p id=\"empty\">No bookmarks yet.</p>\n");
    }
    page.push_str("<ul id=\"bookmarks\">\n");
    for bookmark in &bookmarks {
        page.push_str(&bookmark_item(bookmark));
    }
    page.push_str("</ul>\n</body></html>\n");

    Ok(Html(page))
}

fn bookmark_item(bookmark: &Record) -> String {
    format!(
        concat!(
            "<li data-id=\"{id}\"><a href=\"{uri}\">{title}</a> ",
            "<time datetime=\"{iso}\">{day}</time> ",
            "<a href=\"/dashboard/bookmarks/{id}/delete\">Delete</a></li>\n",
        ),
        id = bookmark.id,
        uri = escape(&bookmark.target_uri),
        title = escape(&bookmark.title),
        iso = bookmark.created_at.to_rfc3339(),
        day = bookmark.created_at.format("%Y-%m-%d"),
    )
}

async fn create_from_form(
    State(state): State<AppState>,
    identity: Identity,
    form: std::result::Result<Form<RecordDraft>, FormRejection>,
) -> Result<Response> {
    let Form(draft) = form.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let bookmark = state.store.insert(&identity.owner_id, draft).await?;

    tracing::debug!(id = %bookmark.id, owner = %identity.owner_id, "bookmark created");
    Ok(Redirect::to("/dashboard").into_response())
}

async fn confirm_delete_screen(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Html<String>> {
    let id = parse_id(&id)?;
    let bookmark = state.store.get(&identity.owner_id, id).await?;

    let mut page = String::from(HEAD);
    page.push_str(&format!(
        "<h1>Delete bookmark?</h1>\n<p>{} will be removed from every open tab.</p>\n",
        escape(&bookmark.title)
    ));
    page.push_str(&format!(
        concat!(
            "<form id=\"confirm\" method=\"post\" action=\"/dashboard/bookmarks/{}/delete\">",
            "<button>Delete</button></form>\n",
            "<a href=\"/dashboard\">Cancel</a>\n</body></html>\n",
        ),
        bookmark.id
    ));

    Ok(Html(page))
}

async fn delete_from_form(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    state.store.delete_by_id(&identity.owner_id, id).await?;

    tracing::debug!(id = %id, owner = %identity.owner_id, "bookmark deleted");
    Ok(Redirect::to("/dashboard").into_response())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }
}
