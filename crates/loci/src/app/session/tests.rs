use super::*;
use palace::anchors::InMemoryAnchorStore;
use palace::persist::MemoryGateway;

const DT: f32 = 0.1;

fn square_room(half: f32) -> RoomLayout {
    RoomLayout::from_scan(
        vec![
            Vec3::new(-half, 0.0, -half),
            Vec3::new(half, 0.0, -half),
            Vec3::new(half, 0.0, half),
            Vec3::new(-half, 0.0, half),
        ],
        Vec::new(),
    )
    .expect("room")
}

fn catalog(count: usize) -> Vec<ConceptSeed> {
    (1..=count)
        .map(|index| ConceptSeed {
            id: ConceptId(index.to_string()),
            kind: if index == 1 {
                ConceptKind::Object3d
            } else {
                ConceptKind::Image
            },
        })
        .collect()
}

fn test_config(seed: u64) -> SessionConfig {
    SessionConfig {
        user_id: "UserID".to_string(),
        user_name: "tester".to_string(),
        experience_id: "ExperienceID".to_string(),
        rng_seed: seed,
    }
}

fn inside_input() -> SessionInput {
    SessionInput {
        user: UserPose {
            position: Vec3::new(0.0, 1.6, 0.0),
            forward: Vec3::FORWARD,
        },
    }
}

fn outside_input() -> SessionInput {
    SessionInput {
        user: UserPose {
            position: Vec3::new(40.0, 1.6, 0.0),
            forward: Vec3::FORWARD,
        },
    }
}

struct Harness {
    session: Session,
    store: InMemoryAnchorStore,
    gateway: MemoryGateway,
}

impl Harness {
    fn new(concepts: usize) -> Self {
        Self::with_seed(concepts, 42)
    }

    fn with_seed(concepts: usize, seed: u64) -> Self {
        let mut store = InMemoryAnchorStore::new();
        let mut gateway = MemoryGateway::default();
        let session = Session::begin(
            test_config(seed),
            square_room(5.0),
            catalog(concepts),
            &HashMap::new(),
            &mut store,
            &mut gateway,
        );
        let mut harness = Self {
            session,
            store,
            gateway,
        };
        harness.settle(3);
        assert!(harness.session.is_initialized());
        harness
    }

    fn resume(&mut self, concepts: usize) -> Harness {
        // A fresh process against the same store and persisted experiences.
        let experiences = self.gateway.experiences.clone();
        let mut store = std::mem::take(&mut self.store);
        let mut gateway = MemoryGateway {
            experiences: experiences.clone(),
            standings: self.gateway.standings.clone(),
            ..MemoryGateway::default()
        };
        let session = Session::begin(
            test_config(7),
            square_room(5.0),
            catalog(concepts),
            &experiences,
            &mut store,
            &mut gateway,
        );
        let mut harness = Harness {
            session,
            store,
            gateway,
        };
        harness.settle(5);
        harness
    }

    fn settle(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.session
                .update(DT, &inside_input(), &mut self.store, &mut self.gateway);
        }
    }

    fn settle_seconds(&mut self, seconds: f32) {
        let ticks = (seconds / DT).ceil() as usize;
        self.settle(ticks);
    }

    fn menu(&mut self, button: MenuButton) {
        self.session
            .menu_button_pressed(button, &mut self.store, &mut self.gateway);
    }

    fn ring_position(&self, index: usize, count: usize) -> Vec3 {
        let angle = index as f32 * std::f32::consts::TAU / count as f32;
        Vec3::new(angle.cos() * 2.5, 0.0, angle.sin() * 2.5)
    }

    fn place_all_magnets(&mut self, count: usize) {
        self.menu(MenuButton::MagnetDistribution);
        self.settle(2);
        for index in 0..count {
            let magnet = *self
                .session
                .registry
                .magnet_ids()
                .last()
                .expect("a magnet to place");
            let target = self.ring_position(index, count);
            self.session
                .magnet_grabbed(magnet, &mut self.store, &mut self.gateway);
            self.session
                .magnet_released(magnet, target, &mut self.store);
            self.settle(2);
        }
        assert!(self
            .session
            .available_phases()
            .contains(&Phase::ConceptDistribution));
    }

    fn place_all_concepts(&mut self, count: usize) {
        self.menu(MenuButton::ConceptDistribution);
        self.settle(2);
        for index in 0..count {
            let concept = self
                .session
                .registry
                .concepts_in_scene()
                .last()
                .cloned()
                .expect("a concept to place");
            let magnet = self.session.registry.magnet_ids()[index];
            let target = self
                .session
                .registry
                .magnet(magnet)
                .expect("magnet")
                .position;
            self.session
                .concept_grabbed(&concept, &mut self.store, &mut self.gateway);
            self.session
                .concept_released(&concept, target, &mut self.store, &mut self.gateway);
            self.settle(2);
        }
        assert!(self.session.available_phases().contains(&Phase::PlayingMain));
    }

    fn ready_to_play(concepts: usize) -> Harness {
        let mut harness = Harness::new(concepts);
        harness.place_all_magnets(concepts);
        harness.place_all_concepts(concepts);
        harness
    }

    fn start_playing(&mut self) {
        self.menu(MenuButton::Playing);
        self.settle(1);
        assert_eq!(self.session.phase(), Phase::PlayingMain);
    }

    fn free_active_magnet(&self) -> (MagnetId, ConceptId) {
        for (magnet, slot) in &self.session.slots {
            let active = self
                .session
                .registry
                .magnet(*magnet)
                .is_some_and(|entity| entity.active);
            if active && slot.attached_concept.is_none() {
                let concept = slot.associated_concept.clone().expect("associated concept");
                return (*magnet, concept);
            }
        }
        panic!("no free active magnet");
    }

    fn place_correct(&mut self) {
        let (magnet, concept) = self.free_active_magnet();
        let target = self
            .session
            .registry
            .magnet(magnet)
            .expect("magnet")
            .position;
        self.session
            .concept_grabbed(&concept, &mut self.store, &mut self.gateway);
        self.session
            .concept_released(&concept, target, &mut self.store, &mut self.gateway);
    }
}

// ---- distribution ------------------------------------------------------------

#[test]
fn fresh_session_starts_in_magnet_distribution_with_a_table() {
    let harness = Harness::new(3);
    assert_eq!(harness.session.phase(), Phase::MagnetDistribution);
    assert!(harness.session.registry.table().is_some());
    assert_eq!(
        harness.session.available_phases(),
        &BTreeSet::from([Phase::MagnetDistribution])
    );
}

#[test]
fn welcome_dialog_opens_on_init() {
    let harness = Harness::new(3);
    let dialog = harness.session.dialog().expect("dialog");
    assert_eq!(dialog.title, "WELCOME");
}

#[test]
fn first_magnet_spawns_when_phase_selected() {
    let mut harness = Harness::new(3);
    harness.menu(MenuButton::MagnetDistribution);
    assert_eq!(harness.session.registry.magnets_in_scene_count(), 1);
}

#[test]
fn magnet_inside_exclusion_zone_blocks_the_next_spawn() {
    let mut harness = Harness::new(3);
    harness.menu(MenuButton::MagnetDistribution);
    let magnet = harness.session.registry.magnet_ids()[0];
    let top = harness
        .session
        .registry
        .table()
        .expect("table")
        .top();

    let near = top + Vec3::new(0.3, 0.0, 0.0);
    harness
        .session
        .magnet_grabbed(magnet, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .magnet_released(magnet, near, &mut harness.store);
    assert_eq!(harness.session.registry.magnets_in_scene_count(), 1);
    assert!(!harness
        .session
        .available_phases()
        .contains(&Phase::ConceptDistribution));

    harness
        .session
        .magnet_grabbed(magnet, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .magnet_released(magnet, Vec3::new(2.5, 0.0, 0.0), &mut harness.store);
    assert_eq!(harness.session.registry.magnets_in_scene_count(), 2);
}

#[test]
fn concept_distribution_unlocks_after_full_magnet_spread() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);
    assert_eq!(harness.session.registry.magnets_in_scene_count(), 3);
    assert!(harness
        .session
        .available_phases()
        .contains(&Phase::ConceptDistribution));
}

#[test]
fn concepts_spawn_one_per_free_magnet_in_catalog_order() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);
    harness.menu(MenuButton::ConceptDistribution);

    // Strict 1:1 invariant: exactly one unassociated concept at a time.
    assert_eq!(harness.session.registry.concepts_in_scene().len(), 1);
    assert_eq!(
        harness.session.registry.concepts_in_scene()[0],
        ConceptId::from("1")
    );

    let magnet = harness.session.registry.magnet_ids()[0];
    let target = harness
        .session
        .registry
        .magnet(magnet)
        .expect("magnet")
        .position;
    let concept = ConceptId::from("1");
    harness
        .session
        .concept_grabbed(&concept, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .concept_released(&concept, target, &mut harness.store, &mut harness.gateway);

    assert_eq!(harness.session.registry.concepts_in_scene().len(), 2);
    assert_eq!(
        harness.session.registry.concepts_in_scene()[1],
        ConceptId::from("2")
    );
}

#[test]
fn playing_never_unlocks_with_an_unassociated_magnet() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);
    harness.menu(MenuButton::ConceptDistribution);

    for _ in 0..2 {
        let concept = harness
            .session
            .registry
            .concepts_in_scene()
            .last()
            .cloned()
            .expect("concept");
        let unassociated: Vec<MagnetId> = harness
            .session
            .slots
            .iter()
            .filter(|(_, slot)| slot.associated_concept.is_none())
            .map(|(magnet, _)| *magnet)
            .collect();
        let target = harness
            .session
            .registry
            .magnet(unassociated[0])
            .expect("magnet")
            .position;
        harness
            .session
            .concept_grabbed(&concept, &mut harness.store, &mut harness.gateway);
        harness
            .session
            .concept_released(&concept, target, &mut harness.store, &mut harness.gateway);
        assert!(!harness.session.available_phases().contains(&Phase::PlayingMain));
    }

    let concept = harness
        .session
        .registry
        .concepts_in_scene()
        .last()
        .cloned()
        .expect("concept");
    let remaining: Vec<MagnetId> = harness
        .session
        .slots
        .iter()
        .filter(|(_, slot)| slot.associated_concept.is_none())
        .map(|(magnet, _)| *magnet)
        .collect();
    let target = harness
        .session
        .registry
        .magnet(remaining[0])
        .expect("magnet")
        .position;
    harness
        .session
        .concept_grabbed(&concept, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .concept_released(&concept, target, &mut harness.store, &mut harness.gateway);
    assert!(harness.session.available_phases().contains(&Phase::PlayingMain));
}

#[test]
fn dropping_a_concept_on_an_occupied_magnet_evicts_the_old_one() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);
    harness.menu(MenuButton::ConceptDistribution);

    let magnet = harness.session.registry.magnet_ids()[0];
    let target = harness
        .session
        .registry
        .magnet(magnet)
        .expect("magnet")
        .position;

    let first = ConceptId::from("1");
    harness
        .session
        .concept_grabbed(&first, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .concept_released(&first, target, &mut harness.store, &mut harness.gateway);
    harness.settle(2);

    let second = ConceptId::from("2");
    harness.session.drain_events();
    harness
        .session
        .concept_grabbed(&second, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .concept_released(&second, target, &mut harness.store, &mut harness.gateway);

    let slot = harness.session.slot(magnet).expect("slot");
    assert_eq!(slot.associated_concept, Some(second));
    let evicted = harness
        .session
        .registry
        .concept(&first)
        .expect("concept")
        .position;
    assert!(positions_are_far(evicted, target));
    let events = harness.session.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::Audio { cue: AudioCue::MagnetSwap, .. })));
}

#[test]
fn concept_released_far_from_magnets_stays_unattached_but_persisted() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);
    harness.menu(MenuButton::ConceptDistribution);
    harness.settle(2);

    let concept = ConceptId::from("1");
    harness
        .session
        .concept_grabbed(&concept, &mut harness.store, &mut harness.gateway);
    harness.session.concept_released(
        &concept,
        Vec3::new(0.0, 0.2, -4.0),
        &mut harness.store,
        &mut harness.gateway,
    );
    harness.settle(2);

    assert!(harness
        .session
        .slots
        .values()
        .all(|slot| slot.associated_concept.is_none()));
    let persisted_concepts = harness
        .session
        .binder()
        .current_records()
        .values()
        .filter(|descriptor| descriptor.object_kind == ObjectKind::Concept)
        .count();
    assert_eq!(persisted_concepts, 1);
}

#[test]
fn first_move_of_a_3d_concept_saves_its_rotation() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);
    harness.menu(MenuButton::ConceptDistribution);

    let concept = ConceptId::from("1");
    let magnet = harness.session.registry.magnet_ids()[0];
    let target = harness
        .session
        .registry
        .magnet(magnet)
        .expect("magnet")
        .position;
    harness
        .session
        .concept_grabbed(&concept, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .concept_released(&concept, target, &mut harness.store, &mut harness.gateway);

    assert_eq!(harness.gateway.rotation_writes, 1);
    let key = harness.session.binder().current_experience().to_string();
    assert!(harness.gateway.experiences[&key]
        .concept_rotations
        .contains_key("1"));

    // Subsequent moves do not rewrite the rotation.
    harness
        .session
        .concept_grabbed(&concept, &mut harness.store, &mut harness.gateway);
    harness
        .session
        .concept_released(&concept, target, &mut harness.store, &mut harness.gateway);
    assert_eq!(harness.gateway.rotation_writes, 1);
}

// ---- resume ------------------------------------------------------------------

#[test]
fn resume_with_all_magnets_only_starts_in_concept_distribution() {
    let mut first = Harness::new(3);
    first.place_all_magnets(3);
    first.settle(5);

    let resumed = first.resume(3);
    assert!(resumed.session.is_initialized());
    assert_eq!(resumed.session.phase(), Phase::ConceptDistribution);
    assert_eq!(resumed.session.registry.magnets_in_scene_count(), 3);
    assert!(!resumed
        .session
        .available_phases()
        .contains(&Phase::PlayingMain));
}

#[test]
fn resume_with_everything_placed_unlocks_playing() {
    let mut first = Harness::ready_to_play(3);
    first.settle(5);

    let resumed = first.resume(3);
    assert_eq!(resumed.session.phase(), Phase::ConceptDistribution);
    assert!(resumed.session.available_phases().contains(&Phase::PlayingMain));
    // Reassociation rebuilt the slot arena from proximity.
    assert!(resumed
        .session
        .slots
        .values()
        .all(|slot| slot.associated_concept.is_some()));
}

#[test]
fn resume_with_partial_magnets_restarts_magnet_distribution() {
    let mut first = Harness::new(4);
    first.menu(MenuButton::MagnetDistribution);
    first.settle(2);
    for index in 0..2 {
        let magnet = *first.session.registry.magnet_ids().last().expect("magnet");
        let target = first.ring_position(index, 4);
        first
            .session
            .magnet_grabbed(magnet, &mut first.store, &mut first.gateway);
        first.session.magnet_released(magnet, target, &mut first.store);
        first.settle(2);
    }
    first.settle(5);

    let resumed = first.resume(4);
    assert_eq!(resumed.session.phase(), Phase::MagnetDistribution);
    assert!(!resumed
        .session
        .available_phases()
        .contains(&Phase::ConceptDistribution));
}

// ---- scoring -----------------------------------------------------------------

#[test]
fn four_correct_placements_release_two_magnets_and_score_ten() {
    let mut harness = Harness::ready_to_play(8);
    harness.start_playing();

    for _ in 0..3 {
        harness.place_correct();
    }
    assert_eq!(harness.session.correct_streak(), 3);
    let before = harness.session.score();

    harness.place_correct();
    assert_eq!(harness.session.correct_streak(), 4);
    // min(4/4 + 1, ceil(8/2)) = 2 released, 2 * 5 * 1 points.
    assert_eq!(harness.session.score() - before, 10);
    assert_eq!(harness.session.count_free_during_playing(), 2);
}

#[test]
fn streak_past_threshold_doubles_score_and_releases_randomly() {
    let mut harness = Harness::ready_to_play(8);
    harness.start_playing();

    for _ in 0..15 {
        harness.place_correct();
    }
    assert_eq!(harness.session.correct_streak(), 15);
    let before = harness.session.score();

    harness.place_correct();
    assert_eq!(harness.session.correct_streak(), 16);
    // Past max_magnets * 4: multiplier 2, adjusted streak re-based to 0.
    assert_eq!(harness.session.score() - before, 10);

    // Fill the board and free one magnet by hand: the next release must come
    // out of the random pool instead of the sequential cursor.
    for magnet in harness.session.magnet_ids_snapshot() {
        if let Some(slot) = harness.session.slots.get_mut(&magnet) {
            slot.attached_concept = slot.associated_concept.clone();
        }
        if let Some(entity) = harness.session.registry.magnet_mut(magnet) {
            entity.active = false;
        }
    }
    let target = harness.session.sorted_magnets[0];
    if let Some(slot) = harness.session.slots.get_mut(&target) {
        slot.attached_concept = None;
    }
    if let Some(entity) = harness.session.registry.magnet_mut(target) {
        entity.active = true;
    }

    harness.place_correct();
    assert_eq!(harness.session.magnets_to_free.len(), 7);
    assert_eq!(harness.session.count_free_during_playing(), 1);
}

#[test]
fn wrong_placement_clamps_score_and_streak_at_zero() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();

    harness.session.score = 3;
    harness.session.correct_streak = 1;

    // Free a second magnet by hand so there is a wrong target available.
    let (active_magnet, free_concept) = harness.free_active_magnet();
    let other = *harness
        .session
        .slots
        .keys()
        .find(|magnet| **magnet != active_magnet)
        .expect("another magnet");
    if let Some(slot) = harness.session.slots.get_mut(&other) {
        slot.attached_concept = None;
    }
    if let Some(entity) = harness.session.registry.magnet_mut(other) {
        entity.active = true;
    }

    let wrong_target = harness
        .session
        .registry
        .magnet(other)
        .expect("magnet")
        .position;
    harness
        .session
        .concept_grabbed(&free_concept, &mut harness.store, &mut harness.gateway);
    harness.session.concept_released(
        &free_concept,
        wrong_target,
        &mut harness.store,
        &mut harness.gateway,
    );

    assert_eq!(harness.session.score(), 0);
    assert_eq!(harness.session.correct_streak(), 0);
}

#[test]
fn wrong_placement_detaches_after_the_grace_delay() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();

    let (active_magnet, free_concept) = harness.free_active_magnet();
    let other = *harness
        .session
        .slots
        .keys()
        .find(|magnet| **magnet != active_magnet)
        .expect("another magnet");
    if let Some(slot) = harness.session.slots.get_mut(&other) {
        slot.attached_concept = None;
    }
    if let Some(entity) = harness.session.registry.magnet_mut(other) {
        entity.active = true;
    }
    let wrong_target = harness
        .session
        .registry
        .magnet(other)
        .expect("magnet")
        .position;

    harness
        .session
        .concept_grabbed(&free_concept, &mut harness.store, &mut harness.gateway);
    harness.session.concept_released(
        &free_concept,
        wrong_target,
        &mut harness.store,
        &mut harness.gateway,
    );
    assert_eq!(
        harness.session.slot(other).expect("slot").attached_concept,
        Some(free_concept.clone())
    );
    assert!(!harness
        .session
        .registry
        .concept(&free_concept)
        .expect("concept")
        .manipulable);

    harness.settle_seconds(WRONG_PLACEMENT_DETACH_SECONDS + DT);

    assert_eq!(harness.session.slot(other).expect("slot").attached_concept, None);
    let entity = harness
        .session
        .registry
        .concept(&free_concept)
        .expect("concept");
    assert!(entity.manipulable);
    assert!(positions_are_far(entity.position, wrong_target));
}

#[test]
fn idle_penalty_subtracts_one_point_per_window_and_goes_negative() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();

    harness.session.score = 0;
    harness.session.game_time = 0.5;

    // One magnet is already free; a full idle threshold plus one penalty
    // window must cost a point, with no floor.
    harness.settle_seconds(0.5 * 2.0 + IDLE_PENALTY_WINDOW_SECONDS + 3.0 * DT);
    assert!(harness.session.score() < 0);
}

// ---- phase escalation --------------------------------------------------------

#[test]
fn playing_main_escalates_to_final_after_eighty_seconds_exactly_once() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();
    harness.session.drain_events();

    harness.settle_seconds(MAIN_PHASE_SECONDS - 1.0);
    assert_eq!(harness.session.phase(), Phase::PlayingMain);

    harness.settle_seconds(2.0);
    assert_eq!(harness.session.phase(), Phase::PlayingFinal);

    let transitions = harness
        .session
        .drain_events()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                SessionEvent::PhaseChanged {
                    to: Phase::PlayingFinal,
                    ..
                }
            )
        })
        .count();
    assert_eq!(transitions, 1);
}

#[test]
fn final_phase_scatters_all_concepts_and_hides_all_but_the_first_magnet() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();
    harness
        .session
        .change_phase(Phase::PlayingFinal, &mut harness.store, &mut harness.gateway);

    assert!(harness
        .session
        .slots
        .values()
        .all(|slot| slot.attached_concept.is_none()));
    let active: Vec<MagnetId> = harness
        .session
        .registry
        .magnet_ids()
        .into_iter()
        .filter(|magnet| {
            harness
                .session
                .registry
                .magnet(*magnet)
                .is_some_and(|entity| entity.active)
        })
        .collect();
    assert_eq!(active, vec![harness.session.sorted_magnets[0]]);
}

#[test]
fn completing_the_final_phase_ends_with_a_bonus_and_publishes_on_yes() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();
    harness
        .session
        .change_phase(Phase::PlayingFinal, &mut harness.store, &mut harness.gateway);
    harness.session.score = 50;

    for _ in 0..4 {
        harness.place_correct();
        harness.settle(1);
    }

    assert_eq!(harness.session.phase(), Phase::Ended);
    assert!(!harness.session.ended_by_timeout());
    assert_eq!(harness.session.score(), 60);
    let dialog = harness.session.dialog().expect("end dialog");
    assert_eq!(dialog.kind, DialogKind::RequestStandings);

    harness.session.dialog_response(true, &mut harness.gateway);
    assert_eq!(harness.gateway.standings.get("tester"), Some(&60));
}

#[test]
fn final_countdown_expiry_ends_the_game_by_timeout() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();

    harness.settle_seconds(MAIN_PHASE_SECONDS + 1.0);
    assert_eq!(harness.session.phase(), Phase::PlayingFinal);

    let countdown = harness.session.game_time() * FINAL_COUNTDOWN_FACTOR;
    harness.settle_seconds(countdown + 1.0);

    assert_eq!(harness.session.phase(), Phase::Ended);
    assert!(harness.session.ended_by_timeout());
}

#[test]
fn declining_the_end_dialog_publishes_nothing() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();
    harness
        .session
        .change_phase(Phase::PlayingFinal, &mut harness.store, &mut harness.gateway);
    for _ in 0..4 {
        harness.place_correct();
    }

    harness.session.dialog_response(false, &mut harness.gateway);
    assert!(harness.gateway.standings.is_empty());
}

// ---- play-to-editing resets --------------------------------------------------

#[test]
fn reset_to_magnet_distribution_erases_concept_records_and_restores_magnets() {
    let mut harness = Harness::ready_to_play(3);
    harness.start_playing();
    harness.settle(2);

    harness.menu(MenuButton::MagnetDistribution);
    assert_eq!(harness.session.timers.len(), 0);
    harness.settle(10);

    assert_eq!(harness.session.phase(), Phase::MagnetDistribution);
    assert_eq!(harness.session.registry.magnets_in_scene_count(), 3);
    assert!(harness.session.registry.table().is_some());
    let concept_records = harness
        .session
        .binder()
        .current_records()
        .values()
        .filter(|descriptor| descriptor.object_kind == ObjectKind::Concept)
        .count();
    assert_eq!(concept_records, 0);
    assert!(harness
        .session
        .registry
        .concepts_in_scene()
        .is_empty());
}

#[test]
fn reset_to_concept_distribution_preserves_associations() {
    let mut harness = Harness::ready_to_play(3);
    harness.start_playing();
    harness.settle(2);

    harness.menu(MenuButton::ConceptDistribution);
    harness.settle(10);

    assert_eq!(harness.session.phase(), Phase::ConceptDistribution);
    assert_eq!(harness.session.registry.concepts_in_scene().len(), 3);
    assert!(harness
        .session
        .slots
        .values()
        .all(|slot| slot.associated_concept.is_some()));
    assert!(harness.session.available_phases().contains(&Phase::PlayingMain));
}

#[test]
fn restarting_playing_from_ended_resets_the_board() {
    let mut harness = Harness::ready_to_play(4);
    harness.start_playing();
    harness
        .session
        .change_phase(Phase::PlayingFinal, &mut harness.store, &mut harness.gateway);
    for _ in 0..4 {
        harness.place_correct();
    }
    assert_eq!(harness.session.phase(), Phase::Ended);

    harness
        .session
        .change_phase(Phase::PlayingMain, &mut harness.store, &mut harness.gateway);
    assert_eq!(harness.session.phase(), Phase::PlayingMain);
    assert_eq!(harness.session.score(), 0);
    assert_eq!(harness.session.correct_streak(), 0);
    // One concept back on the floor, the rest attached.
    assert_eq!(harness.session.count_free_during_playing(), 1);
}

// ---- memorize ----------------------------------------------------------------

#[test]
fn memorize_hides_magnets_and_returns_to_concept_distribution() {
    let mut harness = Harness::ready_to_play(3);

    harness.menu(MenuButton::Memorize);
    assert_eq!(harness.session.phase(), Phase::Memorize);
    assert!(harness
        .session
        .registry
        .magnet_ids()
        .into_iter()
        .all(|magnet| {
            harness
                .session
                .registry
                .magnet(magnet)
                .is_some_and(|entity| !entity.active)
        }));

    harness.menu(MenuButton::ConceptDistribution);
    assert_eq!(harness.session.phase(), Phase::ConceptDistribution);
    assert!(harness.session.available_phases().contains(&Phase::PlayingMain));
}

#[test]
fn memorize_requires_playing_to_be_unlocked() {
    let mut harness = Harness::new(3);
    harness.place_all_magnets(3);

    harness.menu(MenuButton::Memorize);
    assert_ne!(harness.session.phase(), Phase::Memorize);
    let dialog = harness.session.dialog().expect("warning dialog");
    assert_eq!(dialog.title, "WARNING");
}

// ---- dialogs and standings ---------------------------------------------------

#[test]
fn a_new_dialog_replaces_the_old_one() {
    let mut harness = Harness::new(3);
    harness.session.drain_events();
    harness.menu(MenuButton::Playing);

    let events = harness.session.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::DialogDismissed { title } if title == "WELCOME"
    )));
    let dialog = harness.session.dialog().expect("dialog");
    assert_eq!(dialog.title, "WARNING");
}

#[test]
fn dialogs_auto_dismiss_after_ten_seconds() {
    let mut harness = Harness::new(3);
    assert!(harness.session.dialog().is_some());
    harness.settle_seconds(DIALOG_AUTO_DISMISS_SECONDS + DT);
    assert!(harness.session.dialog().is_none());
}

#[test]
fn standings_are_paged_six_at_a_time_in_descending_order() {
    let mut harness = Harness::new(3);
    harness.settle_seconds(DIALOG_AUTO_DISMISS_SECONDS + DT);
    for (index, name) in ["ada", "bo", "cyd", "dee", "eli", "fen", "gus", "hal"]
        .iter()
        .enumerate()
    {
        harness
            .session
            .standings
            .insert(name.to_string(), index as i32);
    }

    harness.menu(MenuButton::Standings);
    let first_page = harness.session.dialog().expect("page one").message.clone();
    assert_eq!(first_page.lines().count(), 6);
    assert!(first_page.starts_with("hal"));

    harness.session.dismiss_dialog();
    let second_page = harness.session.dialog().expect("page two").message.clone();
    assert_eq!(second_page.lines().count(), 2);

    harness.session.dismiss_dialog();
    assert!(harness.session.dialog().is_none());
}

#[test]
fn standings_are_refused_during_play() {
    let mut harness = Harness::ready_to_play(3);
    harness.start_playing();
    harness.menu(MenuButton::Standings);
    let dialog = harness.session.dialog().expect("dialog");
    assert_eq!(dialog.title, "WARNING");
}

#[test]
fn leaving_the_room_interrupts_standings_and_opens_a_blocking_dialog() {
    let mut harness = Harness::new(3);
    harness.settle_seconds(DIALOG_AUTO_DISMISS_SECONDS + DT);
    for index in 0..8 {
        harness
            .session
            .standings
            .insert(format!("user{index}"), index);
    }
    harness.menu(MenuButton::Standings);
    assert_eq!(harness.session.dialog().expect("page").kind, DialogKind::Standings);

    harness
        .session
        .update(DT, &outside_input(), &mut harness.store, &mut harness.gateway);
    let dialog = harness.session.dialog().expect("out of room dialog");
    assert_eq!(dialog.kind, DialogKind::OutOfRoom);
    assert!(harness.session.standings_pages.is_empty());

    // The blocking dialog never times out.
    for _ in 0..((DIALOG_AUTO_DISMISS_SECONDS / DT) as usize + 2) {
        harness
            .session
            .update(DT, &outside_input(), &mut harness.store, &mut harness.gateway);
    }
    assert_eq!(
        harness.session.dialog().expect("still open").kind,
        DialogKind::OutOfRoom
    );

    harness.settle(1);
    assert!(harness.session.dialog().is_none());
}

#[test]
fn table_button_is_ignored_while_a_dialog_is_open() {
    let mut harness = Harness::new(3);
    harness.session.drain_events();
    harness.session.table_button_pressed();
    assert!(harness
        .session
        .drain_events()
        .into_iter()
        .all(|event| !matches!(event, SessionEvent::MenuOpened { .. })));

    harness.settle_seconds(DIALOG_AUTO_DISMISS_SECONDS + DT);
    harness.session.table_button_pressed();
    assert!(harness
        .session
        .drain_events()
        .into_iter()
        .any(|event| matches!(event, SessionEvent::MenuOpened { .. })));
}

// ---- helpers -----------------------------------------------------------------

#[test]
fn damped_factor_is_flat_at_the_reference_point() {
    let factor = damped_factor(1.5, 1.5, 1.0, 0.3);
    assert!((factor - 1.0).abs() < 0.0001);
    assert_eq!(game_time_magnet_count_factor(6), 3.0);
}

#[test]
fn damped_factor_grows_sublinearly_past_the_reference() {
    let near = damped_factor(2.5, 1.5, 1.0, 0.3);
    let far = damped_factor(6.5, 1.5, 1.0, 0.3);
    assert!(near > 1.0);
    assert!(far > near);
    assert!(far - near < (6.5 - 2.5) * 0.3 / GAME_TIME_SOFTNESS);
}

#[test]
fn damped_factor_shrinks_below_the_reference() {
    assert!(game_time_magnet_count_factor(3) < 3.0);
}

#[test]
fn standings_pages_truncate_long_names() {
    let mut standings = HashMap::new();
    standings.insert("a".repeat(30), 5);
    standings.insert("short".to_string(), 9);
    let pages = standings_pages(&standings);
    assert_eq!(pages.len(), 1);
    for line in pages[0].lines() {
        assert!(line.split_whitespace().next().expect("name").len() <= STANDINGS_NAME_LIMIT);
    }
}

#[test]
fn timer_pool_fires_once_and_cancels_in_bulk() {
    let mut pool = TimerPool::default();
    pool.schedule(TimerKind::ToPlayingFinal, 0.25);
    pool.schedule(TimerKind::FinalCountdown, 1.0);

    assert!(pool.tick(0.1).is_empty());
    let due = pool.tick(0.2);
    assert_eq!(due, vec![TimerKind::ToPlayingFinal]);
    assert_eq!(pool.len(), 1);

    pool.cancel_all();
    assert_eq!(pool.len(), 0);
    assert!(pool.tick(10.0).is_empty());
}

#[test]
fn session_state_round_trips_through_the_experience_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let experiences_path = dir.path().join("experiences.json");
    let standings_path = dir.path().join("standings.json");

    let mut store = InMemoryAnchorStore::new();
    let archive =
        palace::persist::ExperienceArchive::load(experiences_path.clone()).expect("archive");
    let mut gateway = palace::persist::FileGateway::new(archive, standings_path.clone());
    let mut session = Session::begin(
        test_config(9),
        square_room(5.0),
        catalog(2),
        &HashMap::new(),
        &mut store,
        &mut gateway,
    );

    let settle = |session: &mut Session,
                      store: &mut InMemoryAnchorStore,
                      gateway: &mut palace::persist::FileGateway,
                      ticks: usize| {
        for _ in 0..ticks {
            session.update(DT, &inside_input(), store, gateway);
        }
    };
    settle(&mut session, &mut store, &mut gateway, 3);
    session.menu_button_pressed(MenuButton::MagnetDistribution, &mut store, &mut gateway);
    settle(&mut session, &mut store, &mut gateway, 2);
    for index in 0..2 {
        let magnet = *session.registry.magnet_ids().last().expect("magnet");
        let angle = index as f32 * std::f32::consts::PI;
        let target = Vec3::new(angle.cos() * 2.5, 0.0, angle.sin() * 2.5);
        session.magnet_grabbed(magnet, &mut store, &mut gateway);
        session.magnet_released(magnet, target, &mut store);
        settle(&mut session, &mut store, &mut gateway, 2);
    }

    let key = session.binder().current_experience().to_string();
    let live_records = session.binder().current_records().clone();
    assert_eq!(live_records.len(), 3); // table + two magnets

    let reloaded =
        palace::persist::ExperienceArchive::load(experiences_path).expect("reload");
    let record = reloaded.experience(&key).expect("experience record");
    assert_eq!(record.anchor_data, live_records);
}

#[test]
fn upload_order_sorting_follows_concept_catalog_order() {
    let mut harness = Harness::ready_to_play(3);
    harness.start_playing();

    let sorted = harness.session.sorted_magnets.clone();
    let order: Vec<ConceptId> = sorted
        .iter()
        .filter_map(|magnet| {
            harness
                .session
                .slot(*magnet)
                .and_then(|slot| slot.associated_concept.clone())
        })
        .collect();
    assert_eq!(
        order,
        vec![ConceptId::from("1"), ConceptId::from("2"), ConceptId::from("3")]
    );
}
