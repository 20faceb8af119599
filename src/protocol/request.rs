//! Request message types

use serde::{Deserialize, Serialize};

/// Request messages from client to bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Open a session to a device, replacing any existing one
    Connect(ConnectParams),

    /// Close the current session
    Disconnect,

    NegotiateSecurity,

    SetOperatingMode(OperatingModeParams),

    /// Send station credentials to the device
    ConfigureWifi(ConfigureWifiParams),

    PostCustomData(CustomDataParams),

    RequestDeviceStatus,

    RequestDeviceVersion,

    /// Scan on the device and locally
    RequestWifiScan,

    /// Current lifecycle state and bound device
    GetState,
}

/// Parameters for connect request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectParams {
    /// Bluetooth address of the device, `aa:bb:cc:dd:ee:ff`
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingModeParams {
    pub mode: i32,
}

/// Parameters for configure_wifi request
///
/// Exactly one of `ssid` and `ssid_hex` must be present. `ssid_hex` carries
/// SSIDs that are not valid UTF-8.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigureWifiParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid_hex: Option<String>,
    pub password: String,
}

impl ConfigureWifiParams {
    /// Raw SSID bytes
    pub fn decode_ssid(&self) -> Result<Vec<u8>, String> {
        match (&self.ssid, &self.ssid_hex) {
            (Some(ssid), None) if !ssid.is_empty() => Ok(ssid.as_bytes().to_vec()),
            (None, Some(ssid_hex)) => {
                let bytes = hex::decode(ssid_hex).map_err(|e| format!("Invalid ssid_hex: {}", e))?;
                if bytes.is_empty() {
                    return Err("SSID must not be empty".to_string());
                }
                Ok(bytes)
            }
            (Some(_), Some(_)) => Err("Only one of ssid and ssid_hex may be given".to_string()),
            _ => Err("SSID must not be empty".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomDataParams {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_without_params() {
        let request = Request::NegotiateSecurity;
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"method":"negotiate_security"}"#);

        let deserialized: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, request);

        let request: Request = serde_json::from_str(r#"{"method":"request_wifi_scan"}"#).unwrap();
        assert_eq!(request, Request::RequestWifiScan);
    }

    #[test]
    fn test_request_connect() {
        let request: Request = serde_json::from_str(
            r#"{"method":"connect","params":{"device_id":"24:0a:c4:00:00:01"}}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::Connect(ConnectParams {
                device_id: "24:0a:c4:00:00:01".to_string()
            })
        );
    }

    #[test]
    fn test_request_set_operating_mode() {
        let request = Request::SetOperatingMode(OperatingModeParams { mode: 1 });
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"method":"set_operating_mode","params":{"mode":1}}"#);
    }

    #[test]
    fn test_configure_wifi_plain_ssid() {
        let request: Request = serde_json::from_str(
            r#"{"method":"configure_wifi","params":{"ssid":"home","password":"secret"}}"#,
        )
        .unwrap();
        let Request::ConfigureWifi(params) = request else {
            panic!("unexpected request");
        };
        assert_eq!(params.decode_ssid().unwrap(), b"home".to_vec());
        assert_eq!(params.password, "secret");
    }

    #[test]
    fn test_configure_wifi_hex_ssid() {
        let params = ConfigureWifiParams {
            ssid: None,
            ssid_hex: Some("ff00e9".to_string()),
            password: String::new(),
        };
        assert_eq!(params.decode_ssid().unwrap(), vec![0xff, 0x00, 0xe9]);
    }

    #[test]
    fn test_configure_wifi_ssid_errors() {
        let missing = ConfigureWifiParams {
            ssid: None,
            ssid_hex: None,
            password: "pw".to_string(),
        };
        assert!(missing.decode_ssid().is_err());

        let both = ConfigureWifiParams {
            ssid: Some("a".to_string()),
            ssid_hex: Some("61".to_string()),
            password: "pw".to_string(),
        };
        assert!(both.decode_ssid().is_err());

        let bad_hex = ConfigureWifiParams {
            ssid: None,
            ssid_hex: Some("zz".to_string()),
            password: "pw".to_string(),
        };
        assert!(bad_hex.decode_ssid().is_err());

        let empty = ConfigureWifiParams {
            ssid: Some(String::new()),
            ssid_hex: None,
            password: "pw".to_string(),
        };
        assert!(empty.decode_ssid().is_err());
    }
}
