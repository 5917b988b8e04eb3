//! HTML rendering.

use std::fmt::Write as _;

use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use warbler_db::{Message, User};

use crate::session::{Flash, Session};

/// `302 Found` to `to`.
pub fn found(to: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, to.to_string())]).into_response()
}

/// Wrap `body` in the site layout, consuming any pending flashes.
pub fn page(mut session: Session, viewer: Option<&User>, title: &str, body: &str) -> Response {
    let flashes = session.take_flashes();
    let html = layout(title, viewer, &flashes, body);
    (session, Html(html)).into_response()
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, viewer: Option<&User>, flashes: &[Flash], body: &str) -> String {
    let nav = match viewer {
        Some(user) => format!(
            r#"<li><a href="/users/{id}"><img src="{img}" alt="{name}"></a></li>
        <li><a href="/messages/new">New Message</a></li>
        <li><a href="/logout">Log out</a></li>"#,
            id = user.id,
            img = escape(&user.image_url),
            name = escape(&user.username),
        ),
        None => r#"<li><a href="/signup">Sign up</a></li>
        <li><a href="/login">Log in</a></li>"#
            .to_string(),
    };

    let mut alerts = String::new();
    for flash in flashes {
        let _ = writeln!(
            alerts,
            r#"<div class="alert alert-{}">{}</div>"#,
            flash.level.as_str(),
            escape(&flash.text)
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
  <link rel="stylesheet" href="/static/stylesheets/style.css">
</head>
<body>
<nav class="navbar">
  <a href="/" class="navbar-brand"><span>Warbler</span></a>
  <form class="navbar-form" action="/users"><input name="q" placeholder="Search Warbler"></form>
  <ul class="nav navbar-nav navbar-right">
        {nav}
  </ul>
</nav>
<div class="container">
{alerts}{body}
</div>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn message_item(message: &Message) -> String {
    format!(
        r#"<li class="list-group-item">
  <a href="/messages/{id}" class="message-link"></a>
  <a href="/users/{uid}"><img src="{img}" alt="" class="timeline-image"></a>
  <div class="message-area">
    <a href="/users/{uid}">@{name}</a>
    <span class="text-muted">{ts}</span>
    <p>{text}</p>
  </div>
</li>
"#,
        id = message.id,
        uid = message.user_id,
        img = escape(&message.author_image_url),
        name = escape(&message.author_username),
        ts = message.timestamp.format("%d %B %Y"),
        text = escape(&message.text),
    )
}

fn message_list(messages: &[Message]) -> String {
    let items: String = messages.iter().map(message_item).collect();
    format!("<ul class=\"list-group\" id=\"messages\">\n{items}</ul>")
}

fn user_card(user: &User) -> String {
    format!(
        r#"<div class="card user-card">
  <a href="/users/{id}"><img src="{img}" alt="" class="card-image"></a>
  <a href="/users/{id}" class="card-link"><p>@{name}</p></a>
  <p class="card-bio">{bio}</p>
</div>
"#,
        id = user.id,
        img = escape(&user.image_url),
        name = escape(&user.username),
        bio = escape(user.bio.as_deref().unwrap_or_default()),
    )
}

pub fn login_form(username: &str) -> String {
    format!(
        r#"<div class="row justify-content-md-center">
  <h2 class="join-message">Welcome back.</h2>
  <form method="POST" id="user_form" action="/login">
    <input name="username" placeholder="Username" value="{username}">
    <input name="password" type="password" placeholder="Password">
    <button class="btn btn-primary btn-block btn-lg">Log in</button>
  </form>
</div>"#,
        username = escape(username),
    )
}

pub fn signup_form(username: &str, email: &str, image_url: &str) -> String {
    format!(
        r#"<div class="row justify-content-md-center">
  <h2 class="join-message">Join Warbler today.</h2>
  <form method="POST" id="user_form" action="/signup">
    <input name="username" placeholder="Username" value="{username}">
    <input name="email" type="email" placeholder="E-mail" value="{email}">
    <input name="password" type="password" placeholder="Password">
    <input name="image_url" placeholder="(Optional) Image URL" value="{image_url}">
    <button class="btn btn-primary btn-lg btn-block">Sign me up!</button>
  </form>
</div>"#,
        username = escape(username),
        email = escape(email),
        image_url = escape(image_url),
    )
}

pub fn timeline(viewer: &User, messages: &[Message]) -> String {
    format!(
        r#"<div class="row">
  <aside class="col-md-4" id="home-aside">
    <a href="/users/{id}"><p>@{name}</p></a>
  </aside>
  <div class="col-lg-6">
{list}
  </div>
</div>"#,
        id = viewer.id,
        name = escape(&viewer.username),
        list = message_list(messages),
    )
}

pub fn user_index(users: &[User], query: Option<&str>) -> String {
    if users.is_empty() {
        let q = escape(query.unwrap_or_default());
        return format!("<h3>Sorry, no users found matching \"{q}\"</h3>");
    }
    let cards: String = users.iter().map(user_card).collect();
    format!("<div class=\"row\">\n{cards}</div>")
}

/// Counts shown in the profile header.
pub struct ProfileStats {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
}

/// How the viewer relates to the profile being shown.
pub enum Relation {
    Anonymous,
    Own,
    Following,
    NotFollowing,
}

pub fn profile(
    user: &User,
    stats: &ProfileStats,
    relation: Relation,
    messages: &[Message],
) -> String {
    let action = match relation {
        Relation::Anonymous => String::new(),
        Relation::Own => r#"<a href="/users/profile" class="btn btn-outline-secondary">Edit Profile</a>
    <form method="POST" action="/users/delete"><button class="btn btn-outline-danger">Delete Profile</button></form>"#
            .to_string(),
        Relation::Following => format!(
            r#"<form method="POST" action="/users/stop-following/{}"><button class="btn btn-primary">Unfollow</button></form>"#,
            user.id
        ),
        Relation::NotFollowing => format!(
            r#"<form method="POST" action="/users/follow/{}"><button class="btn btn-outline-primary">Follow</button></form>"#,
            user.id
        ),
    };

    format!(
        r#"<div id="warbler-hero" style="background-image: url('{header}')"></div>
<img src="{img}" alt="Image for {name}" id="profile-avatar">
<div class="row full-width">
  <ul class="user-stats nav nav-pills">
    <li class="stat"><p class="small">Messages</p><h4><a href="/users/{id}">{n_messages}</a></h4></li>
    <li class="stat"><p class="small">Following</p><h4><a href="/users/{id}/following">{n_following}</a></h4></li>
    <li class="stat"><p class="small">Followers</p><h4><a href="/users/{id}/followers">{n_followers}</a></h4></li>
  </ul>
  <div class="ml-auto">
    {action}
  </div>
</div>
<div class="row">
  <div class="col-sm-3">
    <h4 id="sidebar-username">@{name}</h4>
    <p>{bio}</p>
    <p class="user-location">{location}</p>
  </div>
  <div class="col-sm-6">
{list}
  </div>
</div>"#,
        id = user.id,
        header = escape(&user.header_image_url),
        img = escape(&user.image_url),
        name = escape(&user.username),
        bio = escape(user.bio.as_deref().unwrap_or_default()),
        location = escape(user.location.as_deref().unwrap_or_default()),
        n_messages = stats.messages,
        n_following = stats.following,
        n_followers = stats.followers,
        list = message_list(messages),
    )
}

pub fn follow_list(user: &User, heading: &str, users: &[User]) -> String {
    let cards: String = users.iter().map(user_card).collect();
    format!(
        r#"<div class="row">
  <h4 id="sidebar-username"><a href="/users/{id}">@{name}</a></h4>
  <h5>{heading}</h5>
  <div class="col-sm-9">
{cards}  </div>
</div>"#,
        id = user.id,
        name = escape(&user.username),
        heading = escape(heading),
    )
}

pub fn message_form(text: &str) -> String {
    format!(
        r#"<div class="row justify-content-md-center">
  <form method="POST" action="/messages/new">
    <textarea name="text" rows="3" placeholder="What's happening?" maxlength="140">{text}</textarea>
    <button class="btn btn-outline-success btn-block">Add my message!</button>
  </form>
</div>"#,
        text = escape(text),
    )
}

pub fn message_detail(message: &Message, viewer: Option<&User>) -> String {
    let delete = match viewer {
        Some(user) if user.id == message.user_id => format!(
            r#"<form method="POST" action="/messages/{}/delete"><button class="btn btn-outline-danger">Delete</button></form>"#,
            message.id
        ),
        _ => String::new(),
    };

    format!(
        r#"<div class="message-detail">
  <a href="/users/{uid}"><img src="{img}" alt="" class="timeline-image"></a>
  <a href="/users/{uid}">@{name}</a>
  <p class="single-message">{text}</p>
  <span class="text-muted">{ts}</span>
  {delete}
</div>"#,
        uid = message.user_id,
        img = escape(&message.author_image_url),
        name = escape(&message.author_username),
        text = escape(&message.text),
        ts = message.timestamp.format("%d %B %Y"),
    )
}

pub fn profile_form(user: &User) -> String {
    format!(
        r#"<div class="row justify-content-md-center">
  <h2 class="join-message">Edit Your Profile.</h2>
  <form method="POST" id="user_form" action="/users/profile">
    <input name="username" value="{name}">
    <input name="email" type="email" value="{email}">
    <input name="image_url" value="{img}">
    <input name="header_image_url" value="{header}">
    <textarea name="bio">{bio}</textarea>
    <input name="location" value="{location}">
    <p>To confirm changes, enter your password:</p>
    <input name="password" type="password" placeholder="Password">
    <button class="btn btn-success">Edit this user!</button>
    <a href="/users/{id}" class="btn btn-outline-secondary">Cancel</a>
  </form>
</div>"#,
        id = user.id,
        name = escape(&user.username),
        email = escape(&user.email),
        img = escape(&user.image_url),
        header = escape(&user.header_image_url),
        bio = escape(user.bio.as_deref().unwrap_or_default()),
        location = escape(user.location.as_deref().unwrap_or_default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn found_is_a_302_with_location() {
        let response = found("/login");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn login_form_has_the_submit_button() {
        assert!(login_form("").contains(
            r#"<button class="btn btn-primary btn-block btn-lg">Log in</button>"#
        ));
    }

    #[test]
    fn empty_search_names_the_query() {
        assert_eq!(
            user_index(&[], Some("<b>")),
            "<h3>Sorry, no users found matching \"&lt;b&gt;\"</h3>"
        );
    }
}
