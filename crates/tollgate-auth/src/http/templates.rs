//! Minimal HTML pages served by the authorize endpoint.
//!
//! The real consent screen belongs to the website; these pages only carry
//! enough markup to complete the protocol.

use crate::oauth::authorize::{AuthorizationRequest, ConsentPrompt};

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n{}\n</html>\n",
        html_escape(title),
        body
    )
}

fn hidden_input(out: &mut String, name: &str, value: &str) {
    out.push_str("<input type=\"hidden\" name=\"");
    out.push_str(name);
    out.push_str("\" value=\"");
    out.push_str(&html_escape(value));
    out.push_str("\">\n");
}

/// Self-submitting form for `response_mode=form_post`.
pub fn render_form_post(action: &str, code: &str, state: Option<&str>) -> String {
    let mut body = String::with_capacity(512);
    body.push_str("<body onload=\"document.forms[0].submit()\">\n");
    body.push_str("<form method=\"POST\" action=\"");
    body.push_str(&html_escape(action));
    body.push_str("\">\n");
    hidden_input(&mut body, "code", code);
    if let Some(state) = state {
        hidden_input(&mut body, "state", state);
    }
    body.push_str("<noscript><button type=\"submit\">Continue</button></noscript>\n");
    body.push_str("</form>\n</body>");

    html_page("Submit This Form", &body)
}

/// Consent form that re-POSTs the original request to the authorize
/// endpoint once approved.
pub fn render_consent(prompt: &ConsentPrompt, request: &AuthorizationRequest) -> String {
    let mut body = String::with_capacity(1024);
    body.push_str("<body>\n<h1>Authorize ");
    body.push_str(&html_escape(&prompt.application.name));
    body.push_str("</h1>\n<p>This application is requesting access to:</p>\n<ul>\n");
    for scope in prompt.scopes.iter() {
        body.push_str("<li>");
        body.push_str(scope.as_str());
        body.push_str("</li>\n");
    }
    body.push_str("</ul>\n<form method=\"POST\">\n");

    hidden_input(&mut body, "client_id", &request.client_id);
    hidden_input(&mut body, "redirect_uri", &request.redirect_uri);
    hidden_input(&mut body, "scope", &prompt.scopes.to_string());
    hidden_input(&mut body, "response_type", &request.response_type);
    let optional = [
        ("response_mode", &request.response_mode),
        ("code_challenge", &request.code_challenge),
        ("code_challenge_method", &request.code_challenge_method),
        ("state", &request.state),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            hidden_input(&mut body, name, value);
        }
    }

    body.push_str("<button type=\"submit\">Authorize</button>\n</form>\n</body>");
    html_page("Authorize Application", &body)
}

/// Page showing an out-of-band code for the user to copy.
pub fn render_out_of_band(display: &str) -> String {
    let body = format!(
        "<body>\n<p>Copy this code and paste it into the application:</p>\n<pre id=\"authorization-code\">{}</pre>\n</body>",
        html_escape(display)
    );
    html_page("Authorization Code", &body)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
