//! Server-rendered pages: the sign-in form and the protected dashboard.

use crate::flow::{FlowStage, FlowState, NoticeKind};
use crate::models::{GatehouseSession, ProviderDescriptor};

/// Render the sign-in page for the current flow state.
///
/// Zero providers renders the OTP path alone; the provider list section is
/// simply absent.
#[must_use]
pub fn render_sign_in(state: &FlowState, providers: &[ProviderDescriptor]) -> String {
    let notice = render_notice(state);
    let form = match &state.stage {
        FlowStage::AwaitingCode { .. } => render_code_form(state),
        _ => render_email_form(state),
    };
    let provider_buttons = render_provider_buttons(providers);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sign In</title>
    <style>{}</style>
</head>
<body>
    <div class="container">
        <div class="login-box">
            <h1>Sign In</h1>
            {notice}
            {form}
            {provider_buttons}
        </div>
    </div>
</body>
</html>"#,
        page_styles(),
        notice = notice,
        form = form,
        provider_buttons = provider_buttons
    )
}

/// Render the protected dashboard for an established session.
#[must_use]
pub fn render_dashboard(session: &GatehouseSession) -> String {
    let user = serde_json::to_string_pretty(&session.user).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Dashboard</title>
    <style>{}</style>
</head>
<body>
    <div class="container">
        <div class="login-box">
            <h1>Dashboard</h1>
            <p>Signed in since {}</p>
            <pre>{}</pre>
            <form method="post" action="/sign_out">
                <button type="submit">Sign out</button>
            </form>
        </div>
    </div>
</body>
</html>"#,
        page_styles(),
        session.established_at.format("%Y-%m-%d %H:%M:%S UTC"),
        escape_html(&user)
    )
}

fn render_notice(state: &FlowState) -> String {
    state.notice.as_ref().map_or_else(String::new, |notice| {
        let class = match notice.kind {
            NoticeKind::Success => "notice notice-success",
            NoticeKind::Error => "notice notice-error",
        };
        format!(
            r#"<div class="{class}">{}<a class="dismiss" href="/sign_in/dismiss">&times;</a></div>"#,
            escape_html(&notice.message)
        )
    })
}

fn render_email_form(state: &FlowState) -> String {
    format!(
        r#"<form method="post" action="/sign_in/email">
                <label for="email">Email</label>
                <input type="email" id="email" name="email" value="{}" required>
                <button type="submit">Email me a code</button>
            </form>"#,
        escape_html(&state.form.email)
    )
}

fn render_code_form(state: &FlowState) -> String {
    let email = escape_html(&state.form.email);
    format!(
        r#"<form method="post" action="/sign_in/code">
                <label for="email">Email</label>
                <input type="email" id="email" name="email" value="{email}" required>
                <label for="otp">One-time code</label>
                <input type="text" id="otp" name="otp" value="{}" inputmode="numeric" maxlength="6" required>
                <button type="submit">Verify code</button>
            </form>
            <form method="post" action="/sign_in/email">
                <input type="hidden" name="email" value="{email}">
                <button type="submit" class="link-button">Resend code</button>
            </form>"#,
        escape_html(&state.form.otp)
    )
}

fn render_provider_buttons(providers: &[ProviderDescriptor]) -> String {
    if providers.is_empty() {
        return String::new();
    }
    let buttons = providers
        .iter()
        .map(|provider| {
            let icon = provider.icon.as_ref().map_or_else(String::new, |icon| {
                format!(
                    r#"<img src="data:image/png;base64,{}" alt="" width="20" height="20">"#,
                    escape_html(icon)
                )
            });
            format!(
                r#"<a href="/oauth/{}" class="provider-button">{icon}<span>Continue with {}</span></a>"#,
                escape_html(&provider.name),
                escape_html(&provider.display_name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n                ");
    format!(
        r#"<div class="divider">or</div>
            <div class="button-container">
                {buttons}
            </div>"#
    )
}

/// Minimal HTML escaping for user-entered and service-provided values.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page_styles() -> &'static str {
    r"
    body { font-family: system-ui, sans-serif; background: #f4f4f5; margin: 0; }
    .container { display: flex; justify-content: center; padding-top: 10vh; }
    .login-box { background: #fff; border-radius: 8px; padding: 2rem; width: 22rem;
                 box-shadow: 0 1px 4px rgba(0,0,0,0.1); }
    label { display: block; margin-top: 1rem; font-size: 0.875rem; }
    input { width: 100%; padding: 0.5rem; margin-top: 0.25rem; box-sizing: border-box; }
    button { margin-top: 1rem; padding: 0.5rem 1rem; cursor: pointer; }
    .link-button { background: none; border: none; color: #2563eb; padding: 0; }
    .notice { padding: 0.75rem; border-radius: 4px; margin-bottom: 1rem; }
    .notice-success { background: #ecfdf5; color: #065f46; }
    .notice-error { background: #fef2f2; color: #991b1b; }
    .notice .dismiss { float: right; text-decoration: none; color: inherit; }
    .divider { text-align: center; color: #9ca3af; margin: 1.5rem 0 0.5rem; }
    .provider-button { display: flex; align-items: center; gap: 0.5rem; padding: 0.5rem;
                       border: 1px solid #d1d5db; border-radius: 4px; margin-top: 0.5rem;
                       text-decoration: none; color: inherit; }
    pre { background: #f4f4f5; padding: 0.75rem; overflow-x: auto; }
    "
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{CredentialForm, Notice};

    fn state_awaiting_code() -> FlowState {
        FlowState {
            stage: FlowStage::AwaitingCode {
                challenge_id: "c1".to_string(),
            },
            form: CredentialForm {
                email: "a@b.com".to_string(),
                otp: String::new(),
            },
            notice: None,
            busy: false,
        }
    }

    #[test]
    fn test_initial_page_shows_email_form() {
        let html = render_sign_in(&FlowState::default(), &[]);
        assert!(html.contains(r#"action="/sign_in/email""#));
        assert!(!html.contains(r#"name="otp""#));
    }

    #[test]
    fn test_awaiting_code_shows_code_form_with_email() {
        let html = render_sign_in(&state_awaiting_code(), &[]);
        assert!(html.contains(r#"action="/sign_in/code""#));
        assert!(html.contains("a@b.com"));
        assert!(html.contains("Resend code"));
    }

    #[test]
    fn test_zero_providers_renders_no_provider_list() {
        let html = render_sign_in(&FlowState::default(), &[]);
        assert!(!html.contains("Continue with"));
    }

    #[test]
    fn test_providers_render_in_service_order() {
        let providers = vec![
            ProviderDescriptor {
                name: "google".to_string(),
                display_name: "Google".to_string(),
                icon: None,
            },
            ProviderDescriptor {
                name: "github".to_string(),
                display_name: "GitHub".to_string(),
                icon: Some("aWNvbg==".to_string()),
            },
        ];
        let html = render_sign_in(&FlowState::default(), &providers);
        let google = html.find("Continue with Google").unwrap();
        let github = html.find("Continue with GitHub").unwrap();
        assert!(google < github);
        assert!(html.contains("data:image/png;base64,aWNvbg=="));
    }

    #[test]
    fn test_notice_is_escaped_and_dismissible() {
        let mut state = FlowState::default();
        state.notice = Some(Notice {
            kind: NoticeKind::Error,
            message: "<script>alert(1)</script>".to_string(),
        });
        let html = render_sign_in(&state, &[]);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("/sign_in/dismiss"));
    }
}
