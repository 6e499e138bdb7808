//! Blog search-engine ping broadcast.
//!
//! After a publish, a companion scheduled job notifies a fixed list of
//! `weblogUpdates` XML-RPC endpoints that the site has new content. The
//! broadcast is fire-and-forget: each endpoint gets one attempt, results
//! are recorded per endpoint, and the job as a whole counts as successful
//! when at least one endpoint accepted the ping.

use futures::stream::{self, StreamExt};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use std::io::Cursor;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Ping endpoints notified after each publish.
pub const PING_ENDPOINTS: &[&str] = &[
    "http://blog.goo.ne.jp/XMLRPC",
    "http://blogsearch.google.co.jp/ping/RPC2",
    "http://blogsearch.google.com/ping/RPC2",
    "http://ping.blogranking.net/cgi-bin/xmlrpc",
    "http://ping.fc2.com/",
    "http://ping.feedburner.com",
    "http://ping.rss.drecom.jp/",
    "http://rpc.weblogs.com/RPC2",
    "http://rpc.pingomatic.com/",
    "http://www.blogpeople.net/servlet/weblogUpdates",
    "http://ping.blo.gs/",
    "http://api.my.yahoo.com/RPC2",
];

/// How many endpoints are contacted concurrently.
const FANOUT: usize = 4;

/// Per-endpoint outcome of one broadcast.
#[derive(Debug, Default)]
pub struct PingReport {
    pub success: Vec<String>,
    pub failed: Vec<String>,
}

impl PingReport {
    /// The broadcast counts as successful when any endpoint accepted it.
    pub fn any_success(&self) -> bool {
        !self.success.is_empty()
    }
}

/// Build a `weblogUpdates.ping` (or `extendedPing` when a post URL is
/// given) XML-RPC payload.
fn build_payload(
    blog_name: &str,
    blog_url: &str,
    post_url: Option<&str>,
) -> Result<String, Box<dyn std::error::Error>> {
    let method = if post_url.is_some() {
        "weblogUpdates.extendedPing"
    } else {
        "weblogUpdates.ping"
    };

    let mut params: Vec<&str> = vec![blog_name, blog_url];
    if let Some(url) = post_url {
        params.push(url);
        // Trailing empty parameter is the optional RSS URL.
        params.push("");
    }

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer
        .create_element("methodCall")
        .write_inner_content(|w| {
            w.create_element("methodName")
                .write_text_content(BytesText::new(method))?;
            w.create_element("params").write_inner_content(|w| {
                for param in &params {
                    w.create_element("param").write_inner_content(|w| {
                        w.create_element("value").write_inner_content(|w| {
                            w.create_element("string")
                                .write_text_content(BytesText::new(param))?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        })?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Scan an XML-RPC response for failure markers.
///
/// A `<fault>` element is the standard failure shape; many weblog ping
/// servers instead answer with a struct whose `flerror` member is `1`.
fn response_indicates_fault(xml: &str) -> bool {
    let mut reader = Reader::from_str(xml);
    let mut in_name = false;
    let mut in_flag_value = false;
    let mut flerror_pending = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"fault" => return true,
                b"name" => in_name = true,
                b"boolean" | b"int" | b"i4" => in_flag_value = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"name" => in_name = false,
                b"boolean" | b"int" | b"i4" => in_flag_value = false,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.xml_content().unwrap_or_default();
                let text = text.trim();
                if in_name {
                    flerror_pending = text == "flerror";
                } else if in_flag_value && flerror_pending && text == "1" {
                    return true;
                }
            }
            Ok(Event::Eof) => return false,
            Err(_) => return false,
            _ => {}
        }
    }
}

/// Send one ping and interpret the response.
async fn ping_endpoint(
    http: &reqwest::Client,
    endpoint: &str,
    payload: &str,
) -> Result<(), String> {
    let response = http
        .post(endpoint)
        .header("Content-Type", "text/xml")
        .timeout(Duration::from_secs(10))
        .body(payload.to_string())
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("http {status}"));
    }
    let body = response.text().await.map_err(|e| e.to_string())?;
    if response_indicates_fault(&body) {
        return Err("endpoint returned an XML-RPC fault".to_string());
    }
    Ok(())
}

/// Notify every configured endpoint about new content.
///
/// Endpoints are contacted a few at a time; each gets exactly one
/// attempt. The report lists which endpoints accepted and which failed.
#[instrument(level = "info", skip_all, fields(%blog_url))]
pub async fn broadcast(
    http: &reqwest::Client,
    blog_name: &str,
    blog_url: &str,
    post_url: Option<&str>,
) -> Result<PingReport, Box<dyn std::error::Error>> {
    let payload = build_payload(blog_name, blog_url, post_url)?;
    info!(
        endpoints = PING_ENDPOINTS.len(),
        extended = post_url.is_some(),
        "Starting ping broadcast"
    );

    let outcomes: Vec<(String, Result<(), String>)> = stream::iter(PING_ENDPOINTS)
        .map(|endpoint| {
            let payload = payload.as_str();
            async move {
                let outcome = ping_endpoint(http, endpoint, payload).await;
                (endpoint.to_string(), outcome)
            }
        })
        .buffer_unordered(FANOUT)
        .collect()
        .await;

    let mut report = PingReport::default();
    for (endpoint, outcome) in outcomes {
        match outcome {
            Ok(()) => {
                info!(%endpoint, "Ping accepted");
                report.success.push(endpoint);
            }
            Err(reason) => {
                warn!(%endpoint, %reason, "Ping failed");
                report.failed.push(endpoint);
            }
        }
    }

    info!(
        ok = report.success.len(),
        failed = report.failed.len(),
        "Ping broadcast finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ping_payload_shape() {
        let xml = build_payload("Gadget Review Blog", "https://blog.example.com", None).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<methodName>weblogUpdates.ping</methodName>"));
        assert!(xml.contains("<string>Gadget Review Blog</string>"));
        assert!(xml.contains("<string>https://blog.example.com</string>"));
        assert_eq!(xml.matches("<param>").count(), 2);
    }

    #[test]
    fn test_extended_ping_payload_includes_post_url() {
        let xml = build_payload(
            "Gadget Review Blog",
            "https://blog.example.com",
            Some("https://blog.example.com/posts/42"),
        )
        .unwrap();
        assert!(xml.contains("<methodName>weblogUpdates.extendedPing</methodName>"));
        assert!(xml.contains("<string>https://blog.example.com/posts/42</string>"));
        assert_eq!(xml.matches("<param>").count(), 4, "post url plus empty rss url");
    }

    #[test]
    fn test_payload_escapes_xml_specials() {
        let xml = build_payload("Tom & Jerry's <Blog>", "https://blog.example.com", None).unwrap();
        assert!(xml.contains("Tom &amp; Jerry's &lt;Blog&gt;"));
    }

    #[test]
    fn test_fault_element_detected() {
        let xml = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>4</int></value></member>
</struct></value></fault></methodResponse>"#;
        assert!(response_indicates_fault(xml));
    }

    #[test]
    fn test_flerror_flag_detected() {
        let xml = r#"<?xml version="1.0"?>
<methodResponse><params><param><value><struct>
<member><name>flerror</name><value><boolean>1</boolean></value></member>
<member><name>message</name><value><string>Too many pings</string></value></member>
</struct></value></param></params></methodResponse>"#;
        assert!(response_indicates_fault(xml));
    }

    #[test]
    fn test_successful_response_is_not_a_fault() {
        let xml = r#"<?xml version="1.0"?>
<methodResponse><params><param><value><struct>
<member><name>flerror</name><value><boolean>0</boolean></value></member>
<member><name>message</name><value><string>Thanks for the ping</string></value></member>
</struct></value></param></params></methodResponse>"#;
        assert!(!response_indicates_fault(xml));
    }
}
