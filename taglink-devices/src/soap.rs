use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use crate::error::DeviceError;

const SOAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimal UPnP SOAP envelope builder/invoker for AVTransport actions. Self-contained (no
/// third-party SOAP crate in the pack targets UPnP specifically); follows the standard
/// envelope shape any UPnP AVTransport control point sends.
pub async fn invoke_action(
    http: &reqwest::Client,
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, DeviceError> {
    let mut body_args = String::new();
    for (name, value) in args {
        body_args.push_str(&format!("<{name}>{}</{name}>", xml_escape(value)));
    }
    let envelope = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body><u:{action} xmlns:u="{service_type}">{body_args}</u:{action}></s:Body></s:Envelope>"#
    );

    let soap_action = format!("\"{service_type}#{action}\"");
    let response = http
        .post(control_url)
        .timeout(SOAP_TIMEOUT)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", soap_action)
        .body(envelope)
        .send()
        .await
        .map_err(|e| DeviceError::Unreachable(control_url.to_string(), e.to_string()))?;

    if !response.status().is_success() {
        return Err(DeviceError::BadResponse(control_url.to_string(), response.status().to_string()));
    }

    response
        .text()
        .await
        .map_err(|e| DeviceError::BadResponse(control_url.to_string(), e.to_string()))
}

/// Extracts the text content of the first element named `tag` from a SOAP response body.
/// Tolerant of namespace prefixes; returns `None` rather than erroring on malformed XML, since
/// callers treat a missing field as "best-effort read failed" (§4.4 failure model).
pub fn extract_element(xml: &str, tag: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut capturing = false;
    let mut out = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if local_name_matches(e.name().as_ref(), tag) => {
                capturing = true;
            }
            Ok(Event::Text(t)) if capturing => {
                out.push_str(&t.unescape().unwrap_or_default());
            }
            Ok(Event::End(e)) if local_name_matches(e.name().as_ref(), tag) => {
                return Some(out);
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                warn!(error = %e, "soap response xml parse error");
                return None;
            }
            _ => {}
        }
        buf.clear();
    }
}

fn local_name_matches(qname: &[u8], local: &str) -> bool {
    let qname = std::str::from_utf8(qname).unwrap_or("");
    qname == local || qname.ends_with(&format!(":{local}"))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Formats seconds as `HH:MM:SS`, the time format AVTransport's `Seek` action with
/// `Unit = REL_TIME` expects.
pub fn seconds_to_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Parses `HH:MM:SS[.mmm]` back into seconds, tolerating the fractional suffix some renderers
/// include in `GetPositionInfo` responses.
pub fn hms_to_seconds(hms: &str) -> Option<f64> {
    let hms = hms.split('.').next().unwrap_or(hms);
    let mut parts = hms.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_round_trip_through_hms() {
        let hms = seconds_to_hms(3723.0);
        assert_eq!(hms, "01:02:03");
        assert_eq!(hms_to_seconds(&hms), Some(3723.0));
    }

    #[test]
    fn extracts_namespaced_element() {
        let xml = r#"<s:Envelope><s:Body><u:GetTransportInfoResponse><CurrentTransportState>PLAYING</CurrentTransportState></u:GetTransportInfoResponse></s:Body></s:Envelope>"#;
        assert_eq!(extract_element(xml, "CurrentTransportState").as_deref(), Some("PLAYING"));
    }
}
