//! Media server endpoint URLs.
//!
//! Socket services live under `<ws|wss>://<host>:<port>/pang/ws/<pub|sub>`; options are appended
//! as query parameters, skipping any that are empty, zero or absent.

use std::fmt;

use anyhow::Result;
use url::Url;

pub const SERVICE_PATH_PREFIX: &str = "pang/ws";
pub const CHANNEL_LIST_PATH: &str = "monitor/http/cmd";

/// Which side of a channel the socket speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Pub,
    Sub,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Pub => "pub",
            ServiceKind::Sub => "sub",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme of the origin the bridge acts for; picks `ws`/`wss` and `http`/`https`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginScheme {
    Http,
    #[default]
    Https,
}

impl OriginScheme {
    pub fn from_secure(secure: bool) -> Self {
        if secure { Self::Https } else { Self::Http }
    }

    pub fn socket_scheme(&self) -> &'static str {
        match self {
            OriginScheme::Http => "ws",
            OriginScheme::Https => "wss",
        }
    }

    pub fn http_scheme(&self) -> &'static str {
        match self {
            OriginScheme::Http => "http",
            OriginScheme::Https => "https",
        }
    }
}

/// A value that may or may not end up in a query string.
pub trait QueryValue {
    /// `None` when the value is falsy and must be omitted.
    fn to_query_value(self) -> Option<String>;
}

impl QueryValue for &str {
    fn to_query_value(self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl QueryValue for String {
    fn to_query_value(self) -> Option<String> {
        (!self.is_empty()).then_some(self)
    }
}

impl QueryValue for &String {
    fn to_query_value(self) -> Option<String> {
        self.as_str().to_query_value()
    }
}

impl QueryValue for bool {
    fn to_query_value(self) -> Option<String> {
        self.then(|| "true".to_string())
    }
}

macro_rules! numeric_query_value {
    ($($ty:ty),*) => {
        $(impl QueryValue for $ty {
            fn to_query_value(self) -> Option<String> {
                (self != 0).then(|| self.to_string())
            }
        })*
    };
}

numeric_query_value!(u16, u32, u64, i32, i64, usize);

impl<T: QueryValue> QueryValue for Option<T> {
    fn to_query_value(self) -> Option<String> {
        self.and_then(QueryValue::to_query_value)
    }
}

/// Query options for a pub/sub socket, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    params: Vec<(String, String)>,
}

impl ServiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: &str, value: impl QueryValue) -> Self {
        if let Some(value) = value.to_query_value() {
            self.params.push((key.to_string(), value));
        }
        self
    }

    pub fn channel(self, value: impl QueryValue) -> Self {
        self.param("channel", value)
    }

    pub fn name(self, value: impl QueryValue) -> Self {
        self.param("name", value)
    }

    pub fn track(self, value: impl QueryValue) -> Self {
        self.param("track", value)
    }

    pub fn mode(self, value: impl QueryValue) -> Self {
        self.param("mode", value)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// `<ws|wss>://<host>:<port>/pang/ws/<kind>?<options>`
pub fn build_service_url(
    kind: ServiceKind,
    options: &ServiceOptions,
    host: &str,
    port: u16,
    scheme: OriginScheme,
) -> Result<Url> {
    let mut url = Url::parse(&format!(
        "{}://{}:{}/{}/{}",
        scheme.socket_scheme(),
        host,
        port,
        SERVICE_PATH_PREFIX,
        kind
    ))?;
    append_options(&mut url, options);
    Ok(url)
}

/// Path and query of a service endpoint without scheme, authority or leading slash,
/// as robots expect it in their server settings.
pub fn service_path(kind: ServiceKind, options: &ServiceOptions) -> Result<String> {
    let mut url = Url::parse(&format!("ws://localhost/{}/{}", SERVICE_PATH_PREFIX, kind))?;
    append_options(&mut url, options);
    let path = url.path().trim_start_matches('/');
    Ok(match url.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    })
}

/// `<http|https>://<host>:<port>/monitor/http/cmd?format=json&op=show&obj=channel`
pub fn channel_list_url(host: &str, port: u16, scheme: OriginScheme) -> Result<Url> {
    let mut url = Url::parse(&format!(
        "{}://{}:{}/{}",
        scheme.http_scheme(),
        host,
        port,
        CHANNEL_LIST_PATH
    ))?;
    url.query_pairs_mut()
        .append_pair("format", "json")
        .append_pair("op", "show")
        .append_pair("obj", "channel");
    Ok(url)
}

fn append_options(url: &mut Url, options: &ServiceOptions) {
    if options.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in options.iter() {
        pairs.append_pair(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sub_url_on_secure_origin() {
        let options = ServiceOptions::new().channel("instant").name("demo");
        let url = build_service_url(ServiceKind::Sub, &options, "cobot.center", 8286, OriginScheme::Https)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://cobot.center:8286/pang/ws/sub?channel=instant&name=demo"
        );
    }

    #[test]
    fn falsy_options_are_omitted() {
        let options = ServiceOptions::new()
            .channel("instant")
            .name("")
            .track(None::<String>)
            .mode(0u32);
        let url = build_service_url(ServiceKind::Pub, &options, "localhost", 8080, OriginScheme::Http)
            .unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/pang/ws/pub?channel=instant");
    }

    #[test]
    fn no_options_means_no_query() {
        let url = build_service_url(
            ServiceKind::Pub,
            &ServiceOptions::new(),
            "localhost",
            8080,
            OriginScheme::Http,
        )
        .unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/pang/ws/pub");
    }

    #[test]
    fn service_path_has_no_leading_slash() {
        let options = ServiceOptions::new()
            .channel("instant")
            .name("robot1")
            .track("colink")
            .mode("bundle");
        assert_eq!(
            service_path(ServiceKind::Pub, &options).unwrap(),
            "pang/ws/pub?channel=instant&name=robot1&track=colink&mode=bundle"
        );
    }

    #[test]
    fn channel_list_uses_http_scheme() {
        let url = channel_list_url("cobot.center", 8286, OriginScheme::Https).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cobot.center:8286/monitor/http/cmd?format=json&op=show&obj=channel"
        );
    }

    proptest! {
        #[test]
        fn only_truthy_options_appear(channel in "[a-z]{0,6}", name in "[a-z]{0,6}", mode in 0u32..3) {
            let options = ServiceOptions::new().channel(channel.as_str()).name(name.as_str()).mode(mode);
            let url = build_service_url(ServiceKind::Sub, &options, "h", 1, OriginScheme::Http).unwrap();
            let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
            prop_assert_eq!(keys.contains(&"channel".to_string()), !channel.is_empty());
            prop_assert_eq!(keys.contains(&"name".to_string()), !name.is_empty());
            prop_assert_eq!(keys.contains(&"mode".to_string()), mode != 0);
            prop_assert!(url.query_pairs().all(|(_, v)| !v.is_empty()));
        }
    }
}
