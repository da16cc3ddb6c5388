mod common;

use std::fs;
use std::time::Duration;

use frharness::campaign::{self, DiscoverySettings};
use frharness::discovery::{Debugger, DebuggerConfig, DiscoveryPhase};
use frharness::domain::ContentHash;
use frharness::harness::Coordinator;
use frharness::session::{plan_gap_fill, Session};

use common::{idle_target, monitor_config, write_script};

#[tokio::test]
async fn test_gather_data_fills_a_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join("train");
    fs::create_dir(&train).unwrap();
    fs::create_dir(train.join("session_01")).unwrap();

    let monitor = write_script(dir.path(), "spy.sh", "echo 'A|AB|B'");
    let config = monitor_config(monitor, idle_target(dir.path()), Duration::from_secs(5));
    let mut coordinator = Coordinator::new(config);

    let inputs = vec!["http://x".to_string(), "http://y".to_string()];
    let summary = campaign::gather_data(&mut coordinator, &inputs, 3, &train).await.unwrap();

    assert_eq!(summary.session, train.join("session_02"));
    assert_eq!(summary.captured, 6);
    assert_eq!(summary.attempted, 6);

    let session = Session::open(&summary.session);
    assert!(session.cpu_info_path().exists());
    for input in &inputs {
        let hash = ContentHash::of(input);
        assert_eq!(session.sample_indices(&hash).unwrap(), vec![0, 1, 2]);
        let trace = fs::read_to_string(session.path().join(format!("{hash}_0"))).unwrap();
        assert_eq!(trace, "A|AB|B");
    }

    let metadata = fs::read_to_string(session.metadata_path()).unwrap();
    assert!(metadata.contains(&format!("{}: http://x\n", ContentHash::of("http://x"))));
    let info = fs::read_to_string(session.session_info_path()).unwrap();
    assert_eq!(info.matches("[3/3] : ").count(), 2);
}

#[tokio::test]
async fn test_fix_missing_continues_sample_indices() {
    let dir = tempfile::tempdir().unwrap();
    let session_dir = dir.path().join("session_01");
    fs::create_dir(&session_dir).unwrap();
    let session = Session::open(&session_dir);

    let hash = ContentHash::of("http://x");
    fs::write(session.metadata_path(), format!("{hash}: http://x\n")).unwrap();
    fs::write(session.session_info_path(), format!("{hash} : [3/5] : 0.10 0.20 0.30 1/100 42\n"))
        .unwrap();
    for index in 0..3 {
        fs::write(session_dir.join(format!("{hash}_{index}")), "old").unwrap();
    }

    let monitor = write_script(dir.path(), "spy.sh", "echo 'B|A'");
    let config = monitor_config(monitor, idle_target(dir.path()), Duration::from_secs(5));
    let mut coordinator = Coordinator::new(config);

    let summary = campaign::fix_missing(
        &mut coordinator,
        &session,
        &session.metadata_path(),
        &session.session_info_path(),
    )
    .await
    .unwrap();

    assert_eq!(summary.inputs, 1);
    assert_eq!(summary.captured, 2);
    assert_eq!(session.sample_indices(&hash).unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(fs::read_to_string(session_dir.join(format!("{hash}_4"))).unwrap(), "B|A");
    assert_eq!(fs::read_to_string(session_dir.join(format!("{hash}_0"))).unwrap(), "old");
}

#[tokio::test]
async fn test_gather_data_survives_monitor_errors() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = write_script(dir.path(), "spy.sh", "echo '[!] probe not mapped'");
    let config = monitor_config(monitor, idle_target(dir.path()), Duration::from_secs(5));
    let mut coordinator = Coordinator::new(config);

    let inputs = vec!["http://x".to_string()];
    let summary = campaign::gather_data(&mut coordinator, &inputs, 2, dir.path()).await.unwrap();

    assert_eq!(summary.captured, 0);
    let session = Session::open(&summary.session);
    assert!(session.sample_indices(&ContentHash::of("http://x")).unwrap().is_empty());
    let info = fs::read_to_string(session.session_info_path()).unwrap();
    assert!(info.contains("[0/2] : "));
}

#[tokio::test]
async fn test_gather_data_keeps_going_after_undecodable_output() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("runs");
    // First run prints a byte that is not UTF-8, later runs a clean trace.
    let body = format!(
        "if [ -e {c} ]; then echo 'A|B'; else touch {c}; printf 'A\\377B\\n'; fi",
        c = counter.display()
    );
    let monitor = write_script(dir.path(), "spy.sh", &body);
    let config = monitor_config(monitor, idle_target(dir.path()), Duration::from_secs(5));
    let mut coordinator = Coordinator::new(config);

    let inputs = vec!["http://x".to_string(), "http://y".to_string()];
    let summary = campaign::gather_data(&mut coordinator, &inputs, 3, dir.path()).await.unwrap();

    assert_eq!(summary.captured, 6);
    let session = Session::open(&summary.session);
    assert_eq!(session.sample_indices(&ContentHash::of("http://y")).unwrap(), vec![0, 1, 2]);
    let info = fs::read_to_string(session.session_info_path()).unwrap();
    assert_eq!(info.matches("[3/3] : ").count(), 2);
}

#[tokio::test]
async fn test_aborted_gather_leaves_a_fillable_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join("train");
    fs::create_dir(&train).unwrap();
    // The monitor deletes itself, so the second capture cannot spawn it.
    let monitor = write_script(dir.path(), "spy.sh", "rm -f -- \"$0\"\necho 'A|B'");
    let config = monitor_config(monitor, idle_target(dir.path()), Duration::from_secs(5));
    let mut coordinator = Coordinator::new(config);

    let inputs = vec!["http://x".to_string(), "http://y".to_string()];
    let err = campaign::gather_data(&mut coordinator, &inputs, 3, &train).await.unwrap_err();
    assert!(err.to_string().contains("http://x"));

    let session = Session::open(train.join("session_01"));
    let hash = ContentHash::of("http://x");
    assert_eq!(session.sample_indices(&hash).unwrap(), vec![0]);
    let info = fs::read_to_string(session.session_info_path()).unwrap();
    assert!(info.starts_with(&format!("{hash} : [1/3] : ")));
    assert!(info.ends_with('\n'));

    let plan = plan_gap_fill(&session.metadata_path(), &session.session_info_path()).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].input, "http://x");
    assert_eq!(plan[0].missing, 2);
}

/// Stands in for `gdb --batch --command=<script> [--args <target> <input>]`.
const FAKE_GDB: &str = r#"
script="${2#--command=}"
log=$(sed -n 's/^set logging file //p' "$script")
if [ "$3" != "--args" ]; then
    printf '\t0x0000555555555000 - 0x0000555555556000 is .text\n' > "$log"
    exit 0
fi
pc() { printf 'pc             0x%s      0x%s <fn>\n' "$1" "$1"; }
case "$5" in
    a) { pc 555555555139; pc 555555555139; pc 555555555139; pc 5555555551a0; } > "$log" ;;
    b) { pc 555555555139; } > "$log" ;;
esac
"#;

#[tokio::test]
async fn test_find_probes_ranks_across_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let gdb = write_script(dir.path(), "gdb.sh", FAKE_GDB);
    let work_dir = dir.path().join("work");
    fs::create_dir(&work_dir).unwrap();

    let mut config = DebuggerConfig::new(idle_target(dir.path()), &work_dir);
    config.debugger = gdb;
    let mut debugger = Debugger::new(config);

    // 0x9000 lands past the end of .text once rebased.
    let candidates = [0x1139, 0x11a0, 0x9000];
    let inputs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let settings = DiscoverySettings {
        sample_duration: Duration::from_millis(300),
        top_n: 1,
        max_inputs: 2,
    };

    let ranking =
        campaign::find_probes(&mut debugger, &candidates, &inputs, settings).await.unwrap();

    assert_eq!(debugger.phase(), DiscoveryPhase::Collected);
    assert_eq!(debugger.script().unwrap().breakpoints().len(), 2);
    assert_eq!(ranking.inputs(), 2);
    let ranked = ranking.ranked();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].address, 0x1139);
    assert_eq!(ranked[0].frequency, 2);

    let script = fs::read_to_string(work_dir.join("script.gdb")).unwrap();
    assert!(script.contains("b *0x555555555139\n"));
    assert!(!script.contains("0x55555555d000"));
    assert!(script.contains("commands 1-2\n"));
}
