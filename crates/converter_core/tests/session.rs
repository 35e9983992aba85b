use converter_core::{update, AppState, Effect, Msg, OutputFormat};

fn init_logging() {
    engine_logging::initialize_for_tests();
}

#[test]
fn assigned_session_is_persisted_once() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::SessionAssigned("S1".to_string()));
    assert_eq!(
        effects,
        vec![Effect::PersistSession {
            session_id: "S1".to_string()
        }]
    );
    assert_eq!(state.session_id(), Some("S1"));

    let (_state, effects) = update(state, Msg::SessionAssigned("S1".to_string()));
    assert!(effects.is_empty());
}

#[test]
fn restored_session_is_not_persisted_again() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::SessionRestored("S0".to_string()));
    assert!(effects.is_empty());
    assert_eq!(state.view().session_id.as_deref(), Some("S0"));
}

#[test]
fn session_id_rides_along_with_the_next_upload() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::SessionRestored("S0".to_string()));
    let (state, _) = update(state, Msg::SessionAssigned("S2".to_string()));
    let (state, _) = update(state, Msg::FilesSelected(vec!["a.png".into()]));
    let (_state, effects) = update(state, Msg::SubmitClicked);

    match effects.as_slice() {
        [Effect::UploadBatch {
            session_id, format, ..
        }] => {
            assert_eq!(session_id.as_deref(), Some("S2"));
            assert_eq!(*format, OutputFormat::Jpeg);
        }
        other => panic!("expected one upload effect, got {other:?}"),
    }
}

#[test]
fn push_connectivity_flag_follows_channel() {
    init_logging();
    let (mut state, _) = update(
        AppState::new(),
        Msg::PushConnectionChanged { connected: true },
    );
    assert!(state.push_connected());
    assert!(state.consume_dirty());

    let (state, _) = update(state, Msg::PushConnectionChanged { connected: false });
    assert!(!state.view().push_connected);
}
