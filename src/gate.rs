//! Same-origin request filtering.

use url::{Origin, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Continue,
    Abort,
}

/// Aborts every request that does not share the page's base origin.
#[derive(Debug, Clone)]
pub struct RequestGate {
    origin: Origin,
}

impl RequestGate {
    pub fn new(base: &Url) -> Self {
        Self {
            origin: base.origin(),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Unparseable URLs count as foreign.
    pub fn decide(&self, request_url: &str) -> RequestDecision {
        match Url::parse(request_url) {
            Ok(url) if url.origin() == self.origin => RequestDecision::Continue,
            _ => RequestDecision::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RequestGate {
        RequestGate::new(&Url::parse("http://localhost:8000").unwrap())
    }

    #[test]
    fn same_origin_requests_continue() {
        let gate = gate();
        assert_eq!(
            gate.decide("http://localhost:8000/assets/app.js"),
            RequestDecision::Continue
        );
        assert_eq!(
            gate.decide("http://localhost:8000/api/data?x=1#frag"),
            RequestDecision::Continue
        );
    }

    #[test]
    fn foreign_origins_are_aborted() {
        let gate = gate();
        assert_eq!(
            gate.decide("https://fonts.googleapis.com/css"),
            RequestDecision::Abort
        );
        assert_eq!(
            gate.decide("http://localhost:9000/app.js"),
            RequestDecision::Abort
        );
        assert_eq!(
            gate.decide("https://localhost:8000/app.js"),
            RequestDecision::Abort
        );
    }

    #[test]
    fn prefix_lookalikes_are_aborted() {
        let gate = gate();
        assert_eq!(
            gate.decide("http://localhost:80001/app.js"),
            RequestDecision::Abort
        );
        assert_eq!(
            gate.decide("http://localhost:8000.evil.example/app.js"),
            RequestDecision::Abort
        );
    }

    #[test]
    fn unparseable_and_opaque_urls_are_aborted() {
        let gate = gate();
        assert_eq!(gate.decide("not a url"), RequestDecision::Abort);
        assert_eq!(gate.decide("data:text/plain,hi"), RequestDecision::Abort);
    }
}
