use std::path::Path;
use std::process::Command;

use frharness::domain::ProbeError;
use frharness::symbolization::{extract_functions, get_probe_addresses};

fn objdump_available() -> bool {
    Command::new("objdump").arg("--version").output().is_ok_and(|o| o.status.success())
}

#[test]
fn test_resolves_main_in_own_binary() {
    if !objdump_available() {
        println!("objdump not installed, skipping");
        return;
    }
    let binary_path = Path::new(env!("CARGO_BIN_EXE_frharness"));

    let table = extract_functions(binary_path).expect("Failed to read symbol table");
    assert!(!table.is_empty());
    assert!(table.get("main").is_some());

    let probes = get_probe_addresses(binary_path, &["main"]).unwrap();
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].tag(), "A");
    assert_ne!(probes[0].address(), 0);
}

#[test]
fn test_unknown_symbol_is_reported() {
    if !objdump_available() {
        println!("objdump not installed, skipping");
        return;
    }
    let binary_path = Path::new(env!("CARGO_BIN_EXE_frharness"));

    let missing = "definitely_not_a_symbol_xyz";
    let err = get_probe_addresses(binary_path, &["main", missing]).unwrap_err();
    assert!(matches!(err, ProbeError::SymbolNotFound(ref name) if name == missing));
    assert_eq!(err.to_string(), "Symbol definitely_not_a_symbol_xyz not found");
}
