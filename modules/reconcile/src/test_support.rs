use inventory_core::{
    Drive, Gathered, HardwareFacts, MemorySummary, NetworkSummary, OsFacts, PrimaryAdapter, Snapshot, Target,
};

/// A healthy workstation scanned by IP.
pub(crate) fn snapshot() -> Snapshot {
    Snapshot {
        target: Target::parse("10.0.0.5").unwrap(),
        computer_name: "WKS-01".into(),
        hardware: Gathered::Available(HardwareFacts {
            manufacturer: "Dell Inc.".into(),
            model: "OptiPlex 7090".into(),
            serial_number: "7XK2Q93".into(),
            asset_tag: String::new(),
            bios_version: "2.11.0".into(),
            processor: "Intel(R) Core(TM) i7-10700 CPU @ 2.90GHz".into(),
        }),
        memory: Gathered::Available(MemorySummary { modules: Vec::new(), total_ram_gb: 16.0 }),
        drives: Gathered::Available(vec![Drive {
            name: Some("sda".into()),
            capacity_gb: Some(476.94),
            kind: Some("SSD".into()),
            model: Some("SAMSUNG MZ7LH512".into()),
        }]),
        os: Gathered::Available(OsFacts {
            name: "Ubuntu".into(),
            version: "22.04".into(),
            architecture: "x86_64".into(),
            install_date: "2023-02-01T09:12:44Z".into(),
        }),
        network: Gathered::Available(NetworkSummary {
            primary: Some(PrimaryAdapter {
                name: "eno1".into(),
                ip_address: "10.0.0.5".into(),
                mac_address: "3c:7c:3f:1e:22:10".into(),
                subnet_mask: "255.255.255.0".into(),
                default_gateway: "10.0.0.1".into(),
                dns_primary: "10.0.0.2".into(),
                dns_secondary: "10.0.0.3".into(),
                wireless: false,
            }),
            secondary: Vec::new(),
        }),
        domain: Gathered::Available("WORKGROUP".into()),
        captured_at: "2026-10-15T08:00:00Z".into(),
    }
}
