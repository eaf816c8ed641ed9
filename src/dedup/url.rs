// src/dedup/url.rs
//! URL signature: canonical form used by the first cascade stage.

use url::Url;

/// Which query parameters count as tracking noise.
///
/// Entries ending in `*` match by prefix (`utm_*`), all others match the
/// parameter name exactly. Matching is ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPolicy {
    pub tracking_params: Vec<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            tracking_params: default_tracking_params(),
        }
    }
}

pub fn default_tracking_params() -> Vec<String> {
    [
        "utm_*", "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "spm", "ref",
        "ref_src", "from", "share_token", "igshid", "yclid", "_hsenc", "_hsmi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl UrlPolicy {
    pub fn is_tracking_param(&self, name: &str) -> bool {
        self.tracking_params.iter().any(|p| match p.strip_suffix('*') {
            Some(prefix) => name
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            None => name.eq_ignore_ascii_case(p),
        })
    }

    /// Canonical URL, or `None` when there is nothing to sign.
    ///
    /// Scheme and host are lower-cased, the fragment and tracking parameters
    /// are dropped, and a trailing slash on the path is removed. Inputs that
    /// do not parse as absolute URLs still get fragment/slash stripping.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match Url::parse(raw) {
            Ok(url) if url.has_host() => Some(self.normalize_parsed(&url)),
            _ => {
                let no_frag = raw.split('#').next().unwrap_or_default();
                let trimmed = no_frag.trim_end_matches('/');
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    fn normalize_parsed(&self, url: &Url) -> String {
        // `Url` already lower-cases scheme and host.
        let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
        if let Some(port) = url.port() {
            out.push(':');
            out.push_str(&port.to_string());
        }
        out.push_str(url.path().trim_end_matches('/'));

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !self.is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !kept.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(kept.iter())
                .finish();
            out.push('?');
            out.push_str(&query);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_fragment_and_slash() {
        let p = UrlPolicy::default();
        assert_eq!(
            p.normalize("http://a.com/x?utm_source=y").as_deref(),
            Some("http://a.com/x")
        );
        assert_eq!(
            p.normalize("HTTPS://News.Example.COM/a/b/?id=7&utm_medium=rss#top").as_deref(),
            Some("https://news.example.com/a/b?id=7")
        );
        assert_eq!(p.normalize("http://a.com/").as_deref(), Some("http://a.com"));
    }

    #[test]
    fn keeps_meaningful_query_and_path_case() {
        let p = UrlPolicy::default();
        assert_eq!(
            p.normalize("https://a.com/Story?page=2&fbclid=abc").as_deref(),
            Some("https://a.com/Story?page=2")
        );
    }

    #[test]
    fn custom_policy_exact_and_prefix() {
        let p = UrlPolicy {
            tracking_params: vec!["sid".into(), "x_*".into()],
        };
        assert!(p.is_tracking_param("SID"));
        assert!(p.is_tracking_param("x_campaign"));
        assert!(!p.is_tracking_param("utm_source"));
        assert!(!p.is_tracking_param("x"));
    }

    #[test]
    fn empty_and_relative_inputs() {
        let p = UrlPolicy::default();
        assert_eq!(p.normalize("   "), None);
        assert_eq!(p.normalize("/news/1/#c").as_deref(), Some("/news/1"));
        assert_eq!(p.normalize("#only"), None);
    }
}
