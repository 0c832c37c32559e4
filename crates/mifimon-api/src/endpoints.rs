// ── Endpoint catalogue ──
//
// Paths and request builders for the router's proc_get / proc_post CGI.

use crate::transport::HttpRequest;

pub const GET_PATH: &str = "/reqproc/proc_get";
pub const POST_PATH: &str = "/reqproc/proc_post";

pub const DEVICE_LIST_PATH: &str = "/reqproc/proc_get?isTest=false&cmd=sta_info1,sta_info2,sta_info3,sta_info4,sta_info5,sta_info6,station_list&multi_data=1";

pub const LATENCY_PROBE_PATH: &str =
    "/reqproc/proc_get?isTest=false&cmd=wa_inner_version&multi_data=1";

/// Fields requested from the system-status endpoint.
pub const SYSTEM_STATUS_FIELDS: &[&str] = &[
    "network_provider",
    "spn_name_data",
    "battery_charging",
    "battery_vol_percent",
    "battery_pers",
    "signalbar",
    "network_type",
    "sub_network_type",
    "realtime_time",
];

pub const REBOOT_BODY: &str = "isTest=false&goformId=REBOOT_DEVICE";

/// Mobile browser identity sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/142.0.0.0 Mobile Safari/537.36";

pub fn system_status_path() -> String {
    format!(
        "{GET_PATH}?multi_data=1&isTest=false&cmd={}",
        SYSTEM_STATUS_FIELDS.join(",")
    )
}

/// Station list with a cache-busting timestamp.
pub fn station_list_path(now_ms: i64) -> String {
    format!("{GET_PATH}?isTest=false&cmd=station_list&multi_data=1&_={now_ms}")
}

/// Hostname list with a cache-busting timestamp.
pub fn hostname_list_path(now_ms: i64) -> String {
    format!("{GET_PATH}?isTest=false&cmd=hostNameList&_={now_ms}")
}

/// `LOGIN` form body. Both values must already be base64 + URL encoded.
pub fn login_body(encoded_username: &str, encoded_password: &str) -> String {
    format!(
        "isTest=false&goformId=LOGIN&username={encoded_username}&password={encoded_password}"
    )
}

/// GET carrying the headers the router's own web UI sends.
pub fn get(path: impl Into<String>, origin: &str) -> HttpRequest {
    HttpRequest::get(path)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/json, text/javascript, */*; q=0.01")
        .header("X-Requested-With", "XMLHttpRequest")
        .header("Referer", format!("{origin}/index.html"))
}

/// Form POST to the command endpoint.
pub fn post(body: impl Into<String>, origin: &str) -> HttpRequest {
    HttpRequest::post(POST_PATH, body)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "application/json, text/javascript, */*; q=0.01")
        .header(
            "Content-Type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        )
        .header("X-Requested-With", "XMLHttpRequest")
        .header("Origin", origin)
        .header("Referer", format!("{origin}/index.html"))
}
