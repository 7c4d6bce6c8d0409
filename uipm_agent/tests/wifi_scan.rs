//! iwlist cell parsing, deduplication, and the scan protocol.
mod common;

use common::{Fixture, Reply, ScriptedExecutor};
use std::sync::Arc;
use std::time::Duration;
use uipm_agent::exec::{CommandErrorLog, CommandGateway};
use uipm_agent::interfaces::interface_names;
use uipm_agent::types::{Security, WifiNetwork};
use uipm_agent::wifi::{find_wireless_iface, parse_scan_output, WirelessScanner};

const SCAN: &str = r#"wlan0     Scan completed :
          Cell 01 - Address: AA:BB:CC:00:00:01
                    Channel:6
                    Frequency:2.437 GHz (Channel 6)
                    Quality=60/70  Signal level=-50 dBm
                    Encryption key:on
                    ESSID:"HomeNet"
                    IE: IEEE 802.11i/WPA2 Version 1
                        Group Cipher : CCMP
          Cell 02 - Address: AA:BB:CC:00:00:02
                    Quality=30/70  Signal level=-80 dBm
                    Encryption key:off
                    ESSID:"Cafe"
          Cell 03 - Address: AA:BB:CC:00:00:03
                    Quality=50/70  Signal level=-62 dBm
                    Encryption key:on
                    ESSID:"OldRouter"
                    IE: WPA Version 1
"#;

fn net(ssid: &str, signal: i32, security: Security) -> WifiNetwork {
    WifiNetwork {
        ssid: ssid.into(),
        signal,
        security,
    }
}

#[test]
fn parses_cells_strongest_first() {
    assert_eq!(
        parse_scan_output(SCAN),
        vec![
            net("HomeNet", -50, Security::Wpa2),
            net("OldRouter", -62, Security::Wpa),
            net("Cafe", -80, Security::Open),
        ]
    );
}

#[test]
fn duplicate_ssid_keeps_strongest() {
    let text = "Cell 01 - Address: 01\nESSID:\"Mesh\"\nSignal level=-70 dBm\nCell 02 - Address: 02\nESSID:\"Mesh\"\nSignal level=-40 dBm\n";
    assert_eq!(parse_scan_output(text), vec![net("Mesh", -40, Security::Open)]);

    let reversed = "Cell 01 - Address: 01\nESSID:\"Mesh\"\nSignal level=-40 dBm\nCell 02 - Address: 02\nESSID:\"Mesh\"\nSignal level=-70 dBm\n";
    assert_eq!(parse_scan_output(reversed), vec![net("Mesh", -40, Security::Open)]);
}

#[test]
fn cell_without_ssid_is_dropped() {
    let text = "Cell 01 - Address: 01\nSignal level=-30 dBm\nIE: WPA2\nCell 02 - Address: 02\nESSID:\"\"\nCell 03 - Address: 03\nESSID:\"Real\"\n";
    assert_eq!(parse_scan_output(text), vec![net("Real", -100, Security::Open)]);
}

#[test]
fn wpa2_wins_regardless_of_order() {
    let wpa_first = "Cell 01 - Address: 01\nESSID:\"A\"\nIE: WPA Version 1\nIE: IEEE 802.11i/WPA2 Version 1\n";
    let wpa2_first = "Cell 01 - Address: 01\nESSID:\"A\"\nIE: IEEE 802.11i/WPA2 Version 1\nIE: WPA Version 1\n";
    assert_eq!(parse_scan_output(wpa_first)[0].security, Security::Wpa2);
    assert_eq!(parse_scan_output(wpa2_first)[0].security, Security::Wpa2);
}

#[test]
fn tolerates_noise_and_empty_output() {
    assert!(parse_scan_output("").is_empty());
    assert!(parse_scan_output("wlan0     No scan results\n").is_empty());
    // lines before the first cell and unparseable signal are ignored
    let text = "ESSID:\"Orphan\"\nCell 01 - Address: 01\nESSID:\"X\"\nSignal level=weak\n";
    assert_eq!(parse_scan_output(text), vec![net("X", -100, Security::Open)]);
}

#[test]
fn security_serializes_lowercase() {
    let json = serde_json::to_value(net("A", -1, Security::Wpa2)).unwrap();
    assert_eq!(json, serde_json::json!({"ssid": "A", "signal": -1, "security": "wpa2"}));
}

fn scanner(fx: &Fixture, exec: &Arc<ScriptedExecutor>) -> (WirelessScanner, Arc<CommandErrorLog>) {
    let log = Arc::new(CommandErrorLog::new());
    let gw = CommandGateway::new(exec.clone(), log.clone());
    (WirelessScanner::new(fx.paths(), gw, Duration::ZERO), log)
}

#[test]
fn no_wireless_interface_means_no_commands() {
    let fx = Fixture::new();
    fx.add_iface("eth0", "0x1003", "aa:aa:aa:aa:aa:aa", false);
    let exec = Arc::new(ScriptedExecutor::new());
    let (scanner, _) = scanner(&fx, &exec);

    assert!(scanner.scan().is_empty());
    assert!(exec.calls().is_empty());
}

#[test]
fn powers_on_then_scans_first_wireless_iface() {
    let fx = Fixture::new();
    fx.add_iface("eth0", "0x1003", "aa:aa:aa:aa:aa:aa", false);
    fx.add_iface("wlan0", "0x1003", "bb:bb:bb:bb:bb:bb", true);
    fx.add_iface("wlan1", "0x1003", "cc:cc:cc:cc:cc:cc", true);
    assert_eq!(find_wireless_iface(&fx.paths()).as_deref(), Some("wlan0"));

    let exec = Arc::new(ScriptedExecutor::new());
    // power-on failure is ignored
    exec.reply("iwconfig", Reply::fail(1, "not supported"));
    exec.reply("iwlist", Reply::ok(SCAN));
    let (scanner, log) = scanner(&fx, &exec);

    let found = scanner.scan();
    assert_eq!(found.len(), 3);
    assert_eq!(
        exec.calls(),
        vec![
            vec!["iwconfig", "wlan0", "power", "on"],
            vec!["iwlist", "wlan0", "scanning"],
        ]
    );
    assert_eq!(log.drain().len(), 1);
}

#[test]
fn failed_scan_is_empty_and_logged() {
    let fx = Fixture::new();
    fx.add_iface("wlan0", "0x1003", "bb:bb:bb:bb:bb:bb", true);
    let exec = Arc::new(ScriptedExecutor::new());
    exec.reply("iwconfig", Reply::ok(""));
    exec.reply("iwlist", Reply::fail(255, "Interface doesn't support scanning"));
    let (scanner, log) = scanner(&fx, &exec);

    assert!(scanner.scan().is_empty());
    let messages: Vec<String> = log.drain().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["iwlist: exit status 255".to_string()]);
}

#[test]
fn wireless_iface_follows_kernel_index_order() {
    let fx = Fixture::new();
    fx.add_iface("lo", "0x9", "00:00:00:00:00:00", false);
    fx.set_ifindex("lo", 1);
    fx.add_iface("wlan0", "0x1003", "bb:bb:bb:bb:bb:bb", true);
    fx.set_ifindex("wlan0", 7);
    fx.add_iface("wlan1", "0x1003", "cc:cc:cc:cc:cc:cc", true);
    fx.set_ifindex("wlan1", 3);
    assert_eq!(
        interface_names(&fx.paths()).unwrap(),
        vec!["lo", "wlan1", "wlan0"]
    );
    assert_eq!(find_wireless_iface(&fx.paths()).as_deref(), Some("wlan1"));

    // no index at all sorts after every indexed interface
    fx.add_iface("wlan2", "0x1003", "dd:dd:dd:dd:dd:dd", true);
    assert_eq!(
        interface_names(&fx.paths()).unwrap().last().map(String::as_str),
        Some("wlan2")
    );
}
