//! File-level behaviour of the autochecks store.

use autochecks::{AutocheckRecord, AutochecksStore, ServiceKey, World};

fn record(ct: &str, item: Option<&str>, params: &str) -> AutocheckRecord {
    AutocheckRecord::new(ServiceKey::new(ct, item.map(str::to_string)), params)
}

#[test]
fn test_written_file_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let store = AutochecksStore::new(dir.path());
    store
        .write(
            "web01",
            vec![
                record("uptime", None, "{}"),
                record("df", Some("/"), "{'levels': (80.0, 90.0)}"),
                record("logwatch", Some("it's"), "None"),
            ],
        )
        .unwrap();

    let text = std::fs::read_to_string(store.path_of("web01", World::Config)).unwrap();
    assert_eq!(
        text,
        "[\n  ('df', '/', {'levels': (80.0, 90.0)}),\n  ('logwatch', \"it's\", None),\n  ('uptime', None, {}),\n]\n"
    );
}

#[test]
fn test_round_trip_keeps_triples() {
    let dir = tempfile::tempdir().unwrap();
    let store = AutochecksStore::new(dir.path());
    let original = vec![
        record("df", Some("C:\\"), "{'trend_range' : 24 }"),
        record("if64", Some("1, 2"), "{'state': ['1'], 'speed': 1000000000L}"),
        record("mem.win", None, "memory_win_default_levels"),
    ];
    store.write("h", original.clone()).unwrap();

    let read = store.read("h").unwrap();
    assert_eq!(read, original);
}

#[test]
fn test_reads_files_written_by_older_versions() {
    let dir = tempfile::tempdir().unwrap();
    let store = AutochecksStore::new(dir.path());
    std::fs::create_dir_all(store.config_dir()).unwrap();
    std::fs::write(
        store.path_of("old", World::Config),
        "# autochecks of host old\n\
         [\n\
         \x20 (\"old\", 'cpu.loads', None, cpuload_default_levels), # legacy\n\
         \x20 ('df', u'/', {}),\n\
         \x20 ('kernel', 'Context Switches', kernel_default_levels)\n\
         ]\n",
    )
    .unwrap();

    let read = store.read("old").unwrap();
    assert_eq!(
        read,
        vec![
            record("cpu.loads", None, "cpuload_default_levels"),
            record("df", Some("/"), "{}"),
            record("kernel", Some("Context Switches"), "kernel_default_levels"),
        ]
    );
}
