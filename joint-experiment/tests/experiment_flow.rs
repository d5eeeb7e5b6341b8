use joint_core::{
    compute_quad, CorrectAnswer, Handedness, JointError, ParticipantProfile, Phase, Response, Side,
    StandardPhase, Viewport,
};
use joint_experiment::{
    config::linspace, ExperimentConfig, ExperimentEvent, ExperimentStateMachine, Prior, PsiConfig,
    PsychometricFunction, StaircaseConfig,
};
use joint_timing::ManualTimer;
use rand::{rngs::StdRng, SeedableRng};

type Machine = ExperimentStateMachine<StandardPhase, ManualTimer, StdRng>;

fn participant() -> ParticipantProfile {
    ParticipantProfile {
        id: "12".into(),
        handedness: Handedness::Left,
        initial_step_degrees: Some(3.0),
        ..Default::default()
    }
}

fn machine(config: ExperimentConfig) -> Machine {
    ExperimentStateMachine::new(config, participant(), ManualTimer::new(), StdRng::seed_from_u64(42))
        .unwrap()
}

fn up_down(max_trials: usize) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.controller.max_trials = Some(max_trials);
    if let StaircaseConfig::UpDown(c) = &mut config.staircase {
        c.max_reversals = None;
    }
    config
}

#[test]
fn runs_both_sessions_to_debrief() {
    let mut m = machine(up_down(4));
    assert!(m.current_phase().is_welcome());

    m.handle_event(ExperimentEvent::SpacePressed).unwrap();
    assert_eq!(m.current_phase().session(), Some(0));
    let first = *m.current_stimulus().unwrap();
    assert_eq!(first.active_side, Side::Left);
    assert_eq!(first.step_degrees, 3.0);
    // First session approaches from below the reference.
    assert_eq!(first.angle_degrees, -10.0);

    for _ in 0..4 {
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Right)).unwrap();
    }
    assert!(m.current_phase().is_intermission());
    assert!(!m.accepts_input());
    assert_eq!(
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Left)),
        Ok(false)
    );

    m.handle_event(ExperimentEvent::SpacePressed).unwrap();
    assert_eq!(m.current_phase().session(), Some(1));
    assert_eq!(m.current_stimulus().unwrap().angle_degrees, 10.0);

    for _ in 0..4 {
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Left)).unwrap();
    }
    assert!(m.current_phase().is_debrief());
    assert_eq!(m.results().len(), 8);
    assert_eq!(m.summaries().len(), 2);

    let second = &m.results()[4];
    assert_eq!(second.session, 1);
    assert_eq!(second.trial_in_session, 0);
    assert_eq!(second.trial_total, 4);
    assert_eq!(second.correct_answer, CorrectAnswer::Left);
    assert!(second.response_correct);

    m.handle_event(ExperimentEvent::SpacePressed).unwrap();
    assert!(m.current_phase().is_welcome());
    assert!(m.results().is_empty());
}

#[test]
fn records_slanted_positions_with_viewport() {
    let mut m = machine(up_down(10));
    let viewport = Viewport::new(0.0, 0.0, 1000.0, 600.0);
    m.set_viewport(viewport).unwrap();
    m.handle_event(ExperimentEvent::SpacePressed).unwrap();
    let presented = *m.current_stimulus().unwrap();
    m.handle_event(ExperimentEvent::ResponseReceived(Response::Right)).unwrap();

    let record = &m.results()[0];
    let quad = compute_quad(&viewport, presented.angle_degrees, presented.active_side).unwrap();
    let reference = compute_quad(&viewport, 0.0, presented.active_side).unwrap();
    assert!((record.current_x.unwrap() - quad.slanted().x).abs() < 1e-9);
    assert!((record.correct_x.unwrap() - reference.slanted().x).abs() < 1e-9);
    assert_eq!(record.correct_answer, CorrectAnswer::Right);
    assert!(record.response_correct);
}

#[test]
fn viewport_limits_the_angle() {
    let mut config = up_down(50);
    config.controller.bounds = joint_core::AngleBounds::new(-89.0, 89.0);
    let mut m = machine(config);
    m.set_viewport(Viewport::new(0.0, 0.0, 400.0, 400.0)).unwrap();
    m.handle_event(ExperimentEvent::SpacePressed).unwrap();
    for _ in 0..40 {
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Right)).unwrap();
    }
    let state = *m.current_stimulus().unwrap();
    let quad = compute_quad(m.viewport().unwrap(), state.angle_degrees, state.active_side).unwrap();
    assert!(quad.slanted().x <= 400.0 + 1e-9);
    assert!(quad.is_simple());
}

#[test]
fn rejects_degenerate_viewport() {
    let mut m = machine(up_down(5));
    assert!(matches!(
        m.set_viewport(Viewport::new(0.0, 0.0, 640.0, 0.0)),
        Err(JointError::InvalidGeometry { .. })
    ));
    assert!(m.viewport().is_none());
}

#[test]
fn psi_sessions_present_reference_offsets() {
    let mut config = ExperimentConfig::default();
    config.controller.max_trials = Some(6);
    config.sessions[0].reference_degrees = 20.0;
    config.staircase = StaircaseConfig::Psi(PsiConfig {
        function: PsychometricFunction::Gumbel,
        threshold: linspace(0.0, 15.0, 16),
        threshold_prior: Prior::Normal { mean: 8.0, sd: 4.0 },
        slope: linspace(0.1, 1.0, 4),
        slope_prior: Prior::Uniform,
        guess_rate: vec![0.5],
        guess_prior: Prior::Uniform,
        lapse_rate: vec![0.0, 0.05],
        lapse_prior: Prior::Uniform,
        stim_levels: (0..=15).map(f64::from).collect(),
        marginalize: true,
    });
    let mut m = machine(config);
    m.handle_event(ExperimentEvent::SpacePressed).unwrap();

    for _ in 0..6 {
        let angle = m.current_stimulus().unwrap().angle_degrees;
        let offset = 20.0 - angle;
        assert!((0.0..=15.0).contains(&offset), "offset {offset}");
        m.handle_event(ExperimentEvent::ResponseReceived(Response::Right)).unwrap();
    }
    assert!(m.current_phase().is_intermission());
    let summary = &m.summaries()[0];
    assert_eq!(summary.trials, 6);
    assert!(summary.psi.is_some());
}

#[test]
fn default_session_ends_at_max_reversals() {
    let config = ExperimentConfig::default();
    let mut m: Machine = ExperimentStateMachine::new(
        config.clone(),
        ParticipantProfile::default(),
        ManualTimer::new(),
        StdRng::seed_from_u64(7),
    )
    .unwrap();
    m.handle_event(ExperimentEvent::SpacePressed).unwrap();
    assert_eq!(m.current_stimulus().unwrap().step_degrees, 2.0);

    let responses = [Response::Left, Response::Right];
    let mut presses = 0;
    while m.current_phase().session() == Some(0) {
        assert!(presses < 100, "session never terminated");
        m.handle_event(ExperimentEvent::ResponseReceived(responses[presses % 2]))
            .unwrap();
        presses += 1;
    }

    let StaircaseConfig::UpDown(up_down) = &config.staircase else {
        panic!("default staircase is up-down");
    };
    let max_reversals = up_down.max_reversals.unwrap();
    // First response cannot reverse; every later one does.
    assert_eq!(presses, max_reversals + 1);
    assert!(presses <= config.controller.max_trials.unwrap());
    assert!(m.current_phase().is_intermission());
    assert_eq!(m.results().len(), presses);
    assert_eq!(m.summaries()[0].trials, presses);
}
