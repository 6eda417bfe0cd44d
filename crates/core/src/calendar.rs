//! Google Calendar "render?action=TEMPLATE" link for the delivery ETA.

use crate::eta::EtaMoment;

const CALENDAR_BASE: &str = "https://calendar.google.com/calendar/render?action=TEMPLATE";
const EVENT_DURATION_MINUTES: u32 = 10;

/// Builds a prefilled calendar-event link. The event lasts ten minutes and
/// is pinned to the given calendar timezone identifier (e.g. `Asia/Almaty`).
pub fn event_link(title: &str, details: &str, start: EtaMoment, timezone: &str) -> String {
    let start_stamp = local_stamp(&start, start.hour, start.minute);

    let end_total = start.hour * 60 + start.minute + EVENT_DURATION_MINUTES;
    let end_stamp = local_stamp(&start, (end_total / 60) % 24, end_total % 60);

    format!(
        "{CALENDAR_BASE}&text={}&dates={}%2F{}&details={}&ctz={}",
        encode_component(title),
        start_stamp,
        end_stamp,
        encode_component(details),
        encode_component(timezone),
    )
}

fn local_stamp(moment: &EtaMoment, hour: u32, minute: u32) -> String {
    format!(
        "{:04}{:02}{:02}T{:02}{:02}00",
        moment.year, moment.month, moment.day, hour, minute
    )
}

/// Minimal percent-encoding for query components: unreserved characters pass
/// through, everything else becomes UTF-8 escapes.
fn encode_component(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
