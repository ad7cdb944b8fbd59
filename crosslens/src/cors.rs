//! CORS for the analysis API, so a frontend served from another origin can
//! call it.

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Method, Status};
use rocket::{options, Request, Response};

/// Origins allowed when `server.allowed_origins` is not configured.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://127.0.0.1:3000"];

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Adds CORS headers to responses for allowed origins. Preflight requests
/// are answered by [`preflight`].
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origins: Vec<String>,
}

impl Cors {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        let allowed_origins = allowed_origins
            .into_iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Self { allowed_origins }
    }

    pub fn from_config(origins: Option<&[String]>) -> Self {
        match origins {
            Some(origins) => Self::new(origins.to_vec()),
            None => Self::new(DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()),
        }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info { name: "CORS", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(origin) = req.headers().get_one("Origin") else {
            return;
        };
        if !self.allows(origin) {
            return;
        }

        res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        res.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        res.set_header(Header::new("Vary", "Origin"));

        if req.method() == Method::Options {
            res.set_header(Header::new("Access-Control-Allow-Methods", ALLOWED_METHODS));
            if let Some(headers) = req.headers().get_one("Access-Control-Request-Headers") {
                res.set_header(Header::new("Access-Control-Allow-Headers", headers.to_string()));
            }
            res.set_header(Header::new("Access-Control-Max-Age", "600"));
        }
    }
}

/// Answers any preflight; the fairing decides whether CORS headers are added.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origins_are_local_frontend() {
        let cors = Cors::from_config(None);
        assert!(cors.allows("http://localhost:3000"));
        assert!(cors.allows("http://127.0.0.1:3000"));
        assert!(!cors.allows("https://evil.example"));
    }

    #[test]
    fn wildcard_and_trailing_slash() {
        let cors = Cors::new(vec!["https://app.example/".into()]);
        assert!(cors.allows("https://app.example"));
        assert!(Cors::new(vec!["*".into()]).allows("https://anything.example"));
    }
}
