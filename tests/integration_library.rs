use chrono::Local;
use drillcall::command::{GroupColor, Library};
use drillcall::schedule::SessionConfig;
use drillcall::session::{SessionEvent, TrainingSession};
use drillcall::stats::{HistoryDb, PlayRecord, SessionRecord};
use drillcall::storage::{FileLibraryStore, LibraryStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tempfile::tempdir;

/// End-to-end: build a library, persist it, run a session from its
/// eligible commands, and verify both historical counters.

#[test]
fn library_to_session_to_counters() {
    let dir = tempdir().unwrap();
    let store = FileLibraryStore::with_path(dir.path().join("library.json"));

    // Build the library the way the manager screen would
    let mut library = Library::default();
    let footwork = library.add_group("footwork", GroupColor::Green);
    let shot = library.add_command("jump shot", None);
    let pivot = library.add_command("pivot", Some(footwork));
    let silent = library.add_command("no audio yet", None);

    library.set_audio_path(&shot, Some(PathBuf::from("/audio/shot.wav")));
    library.set_audio_path(&pivot, Some(PathBuf::from("/audio/pivot.wav")));
    library.set_session_count(&shot, 2);
    library.set_session_count(&pivot, 1);
    library.toggle_selected(&shot);
    library.toggle_selected(&pivot);
    library.toggle_selected(&silent);
    library.set_session_count(&silent, 0);

    store.save(&library).unwrap();
    let mut library = store.load();
    assert!(library.can_start());

    // Run a session over the eligible commands
    let items = library.training_ready();
    assert_eq!(items.len(), 2);

    let config = SessionConfig {
        duration_secs: 60,
        min_break_secs: 2.0,
        max_break_secs: 2.0,
    };
    let mut rng = StdRng::seed_from_u64(7);
    let mut session = TrainingSession::begin(&items, config, &mut rng, 0);
    assert_eq!(session.cues_planned(), 3);

    let history = HistoryDb::open_in_memory().unwrap();
    let started_at = Local::now();

    let mut now_ms = 0;
    while !session.is_over() && now_ms < 120_000 {
        now_ms += 100;
        for event in session.tick(now_ms) {
            match event {
                SessionEvent::CuePlay { command_id, name } => {
                    // The shell's collaborator duties per dispatch
                    library.record_play(&command_id);
                    history
                        .record_play(&PlayRecord {
                            command_id,
                            command_name: name,
                            played_at: Local::now(),
                        })
                        .unwrap();
                }
                SessionEvent::Completed => {}
                SessionEvent::Terminated => {
                    history
                        .record_session(&SessionRecord {
                            started_at,
                            duration_secs: session.duration_secs(),
                            cues_planned: session.cues_planned(),
                            cues_played: session.cues_played(),
                        })
                        .unwrap();
                }
            }
        }
    }

    assert!(session.is_over());
    assert_eq!(session.tally()[&shot], 2);
    assert_eq!(session.tally()[&pivot], 1);

    // Historical counters on the library commands
    assert_eq!(library.command(&shot).unwrap().play_count, 2);
    assert_eq!(library.command(&pivot).unwrap().play_count, 1);
    assert_eq!(library.command(&silent).unwrap().play_count, 0);

    // And in the play log
    assert_eq!(history.play_count(&shot).unwrap(), 2);
    assert_eq!(history.play_count(&pivot).unwrap(), 1);
    assert_eq!(history.session_count().unwrap(), 1);

    // Persisted counters survive a reload
    store.save(&library).unwrap();
    let reloaded = store.load();
    assert_eq!(reloaded.command(&shot).unwrap().play_count, 2);
}

#[test]
fn presets_restore_counts_across_a_reload() {
    let dir = tempdir().unwrap();
    let store = FileLibraryStore::with_path(dir.path().join("library.json"));

    let mut library = Library::default();
    let a = library.add_command("alpha", None);
    let b = library.add_command("beta", None);
    library.set_session_count(&a, 3);
    library.set_session_count(&b, 5);
    let preset = library.save_preset("game day", Some("pregame warmup".to_string()));
    store.save(&library).unwrap();

    let mut library = store.load();
    library.set_session_count(&a, 0);
    library.set_session_count(&b, 1);

    library.apply_preset(&preset);
    assert_eq!(library.command(&a).unwrap().session_count, 3);
    assert_eq!(library.command(&b).unwrap().session_count, 5);
}

#[test]
fn history_csv_export_roundtrip() {
    let dir = tempdir().unwrap();
    let history = HistoryDb::open_in_memory().unwrap();

    for name in ["jab", "jab", "cross"] {
        history
            .record_play(&PlayRecord {
                command_id: name.to_string(),
                command_name: name.to_string(),
                played_at: Local::now(),
            })
            .unwrap();
    }

    let csv_path = dir.path().join("history.csv");
    let written = history.export_plays_csv(&csv_path).unwrap();
    assert_eq!(written, 3);

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][1], "jab");
}
