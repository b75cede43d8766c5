use tower_cookies::{Cookie, Cookies};

use crate::{
    session::{PreferenceStore, Session, ADMIN_TOKEN_KEY},
    utils::AdminTokens,
};

/// Preferences kept in browser cookies, one cookie per key.
#[derive(Clone)]
pub struct CookiePreferences {
    cookies: Cookies,
}

impl CookiePreferences {
    pub fn new(cookies: Cookies) -> Self {
        Self { cookies }
    }
}

impl PreferenceStore for CookiePreferences {
    fn load(&self, key: &str) -> Option<String> {
        self.cookies.get(key).map(|cookie| cookie.value().to_string())
    }

    fn save(&self, key: &str, value: &str) {
        // The admin cookie lives as long as the token it carries.
        let max_age = if key == ADMIN_TOKEN_KEY {
            time::Duration::days(30)
        } else {
            time::Duration::days(365)
        };
        let cookie = Cookie::build((key.to_string(), value.to_string()))
            .path("/")
            .http_only(true)
            .max_age(max_age)
            .build();
        self.cookies.add(cookie);
    }

    fn remove(&self, key: &str) {
        let cookie = Cookie::build((key.to_string(), "")).path("/").build();
        self.cookies.remove(cookie);
    }
}

pub fn current_session(cookies: &Cookies, tokens: &AdminTokens) -> (Session, CookiePreferences) {
    let prefs = CookiePreferences::new(cookies.clone());
    let session = Session::load(&prefs, tokens);
    (session, prefs)
}
