/// The session orchestrator: phase state machine, spawn quotas, scoring and
/// timers. All mutation happens on the single cooperative tick; anchor store
/// failures never reach this type as values, only as counts that refuse to
/// converge.
pub struct Session {
    config: SessionConfig,
    room: RoomLayout,
    registry: ObjectRegistry,
    binder: AnchorBinder,
    rng: StdRng,
    phase: Phase,
    available_phases: BTreeSet<Phase>,
    slots: BTreeMap<MagnetId, MagnetSlot>,
    left_magnets_to_spawn: usize,
    left_concepts_to_spawn: usize,
    score: i32,
    correct_streak: u32,
    index_to_free: usize,
    sorted_magnets: Vec<MagnetId>,
    magnets_to_free: Vec<MagnetId>,
    game_time: f32,
    ended_by_timeout: bool,
    timers: TimerPool,
    dialog: Option<Dialog>,
    standings: HashMap<String, i32>,
    standings_pages: VecDeque<String>,
    interrupt_standings: bool,
    was_in_room: bool,
    pending_transition: Option<Phase>,
    user: UserPose,
    initialized: bool,
    events: SessionEventBus,
}

impl Session {
    /// Builds the session and requests localization of every persisted
    /// anchor of the current experience. Gameplay state is derived once the
    /// readiness predicate turns true inside `update`.
    pub fn begin(
        config: SessionConfig,
        room: RoomLayout,
        catalog: Vec<ConceptSeed>,
        experiences: &HashMap<String, ExperienceData>,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) -> Self {
        let registry = ObjectRegistry::from_catalog(catalog);
        let experience_key = config.experience_key(room.room_code());
        info!(experience = %experience_key, "session starting");

        let bindings = experiences
            .iter()
            .map(|(key, data)| (key.clone(), data.anchor_data.clone()))
            .collect();
        let rotations = experiences
            .get(&experience_key)
            .map(|data| data.concept_rotations.clone())
            .unwrap_or_default();
        let mut binder = AnchorBinder::new(bindings, experience_key, rotations);
        binder.request_load_all(store);

        let standings = match gateway.load_standings() {
            Ok(standings) => standings,
            Err(error) => {
                warn!(error = %error, "standings load failed, starting empty");
                HashMap::new()
            }
        };

        let rng = StdRng::seed_from_u64(config.rng_seed);
        Self {
            config,
            room,
            registry,
            binder,
            rng,
            phase: Phase::MagnetDistribution,
            available_phases: BTreeSet::from([Phase::MagnetDistribution]),
            slots: BTreeMap::new(),
            left_magnets_to_spawn: 0,
            left_concepts_to_spawn: 0,
            score: 0,
            correct_streak: 0,
            index_to_free: 0,
            sorted_magnets: Vec::new(),
            magnets_to_free: Vec::new(),
            game_time: 0.0,
            ended_by_timeout: false,
            timers: TimerPool::default(),
            dialog: None,
            standings,
            standings_pages: VecDeque::new(),
            interrupt_standings: false,
            was_in_room: true,
            pending_transition: None,
            user: UserPose {
                position: Vec3::ZERO,
                forward: Vec3::FORWARD,
            },
            initialized: false,
            events: SessionEventBus::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn available_phases(&self) -> &BTreeSet<Phase> {
        &self.available_phases
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn correct_streak(&self) -> u32 {
        self.correct_streak
    }

    pub fn game_time(&self) -> f32 {
        self.game_time
    }

    pub fn ended_by_timeout(&self) -> bool {
        self.ended_by_timeout
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn binder(&self) -> &AnchorBinder {
        &self.binder
    }

    pub fn slot(&self, magnet: MagnetId) -> Option<&MagnetSlot> {
        self.slots.get(&magnet)
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain()
    }

    /// One cooperative tick. Everything long-lived runs through here: anchor
    /// completions, the readiness-gated init and phase transitions, the
    /// room-boundary monitor, dialog aging, the idle-penalty loop and the
    /// phase-escalation timers.
    pub fn update(
        &mut self,
        dt_seconds: f32,
        input: &SessionInput,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.user = input.user;
        store.tick();
        let appeared = self
            .binder
            .tick(dt_seconds, store, &mut self.registry, gateway);
        if !appeared.is_empty() {
            debug!(count = appeared.len(), "anchors materialized");
        }

        if !self.initialized {
            if self.binder.are_anchors_ready() {
                self.initialize_session(store, gateway);
            }
            return;
        }

        if let Some(target) = self.pending_transition {
            if self.binder.are_anchors_ready() {
                self.pending_transition = None;
                self.complete_playing_reset(target);
            }
        }

        self.update_room_monitor();
        self.update_dialog(dt_seconds);
        self.update_playing(dt_seconds);

        for due in self.timers.tick(dt_seconds) {
            self.handle_timer(due, store, gateway);
        }
    }

    fn initialize_session(
        &mut self,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.initialized = true;
        self.events.emit(SessionEvent::BackgroundMusicStarted);
        self.prepare_phase(store, gateway);

        if !self.all_magnets_outside_table_space() {
            self.phase = Phase::MagnetDistribution;
            self.available_phases.remove(&Phase::ConceptDistribution);
        }

        if self.phase == Phase::ConceptDistribution {
            self.spawn_concept_if_possible(store);
            for magnet_id in self.registry.magnet_ids() {
                if let Some(magnet) = self.registry.magnet_mut(magnet_id) {
                    magnet.manipulable = false;
                }
            }
        }

        self.open_dialog(
            "WELCOME",
            "Welcome to the Loci application, please go to the table following the arrow \
             and press the button located on the table to start the experience.",
            DialogKind::Generic,
            true,
        );
        info!(phase = ?self.phase, "session initialized");
    }

    // ---- magnet distribution ------------------------------------------------

    fn spawn_magnet_if_possible(&mut self, store: &mut dyn AnchorStore) {
        debug!(
            left = self.left_magnets_to_spawn,
            all_outside = self.all_magnets_outside_table_space(),
            "magnet spawn check"
        );
        if self.left_magnets_to_spawn == 0 || !self.all_magnets_outside_table_space() {
            debug!("magnet can not be spawned");
            return;
        }
        let Some(top) = self.table_top() else {
            warn!("magnet spawn requested with no table in the scene");
            return;
        };

        let position = top + Vec3::new(0.0, MAGNET_SPAWN_LIFT, 0.0);
        let magnet = self.registry.spawn_magnet(position);
        self.slots.insert(magnet, MagnetSlot::default());
        self.left_magnets_to_spawn -= 1;
        self.binder
            .attach_anchor(BoundObject::Magnet(magnet), &self.registry, store);
        self.emit_audio(AudioCue::ObjectSpawned, self.table_position());
        debug!(magnet = magnet.0, left = self.left_magnets_to_spawn, "magnet spawned");
    }

    pub fn magnet_grabbed(
        &mut self,
        magnet: MagnetId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.events.emit(SessionEvent::RotatorHidden);
        self.binder.movement_started(
            &BoundObject::Magnet(magnet),
            &mut self.registry,
            store,
            gateway,
        );
    }

    /// A magnet was put down. Updates its exclusion-zone flag, spawns the
    /// next magnet when allowed, recomputes which phases are reachable and
    /// re-anchors the magnet at its new pose.
    pub fn magnet_released(
        &mut self,
        magnet: MagnetId,
        position: Vec3,
        store: &mut dyn AnchorStore,
    ) {
        if let Some(moved) = self.registry.magnet_mut(magnet) {
            moved.position = position;
        }

        if self.phase == Phase::MagnetDistribution {
            let outside = match self.table_top() {
                Some(top) => positions_are_far(position, top),
                None => true,
            };
            if let Some(slot) = self.slots.get_mut(&magnet) {
                slot.outside_exclusion_zone = outside;
            }
            if outside {
                debug!(magnet = magnet.0, "magnet moved outside the table space");
                self.spawn_magnet_if_possible(store);
            } else {
                debug!(magnet = magnet.0, "magnet moved inside the table space");
            }

            if self.all_magnets_outside_table_space() && self.left_magnets_to_spawn == 0 {
                if self.available_phases.insert(Phase::ConceptDistribution) {
                    self.open_dialog(
                        "Concept Distribution Available",
                        "You can now go to the table and select Concept Distribution phase.",
                        DialogKind::Generic,
                        true,
                    );
                }
            } else {
                self.available_phases.remove(&Phase::ConceptDistribution);
            }
        }

        self.binder
            .movement_ended(BoundObject::Magnet(magnet), &self.registry, store);
    }

    // ---- concept distribution ----------------------------------------------

    fn spawn_concept_if_possible(&mut self, store: &mut dyn AnchorStore) {
        if self.count_free_magnets() != self.left_concepts_to_spawn
            || self.left_concepts_to_spawn == 0
        {
            return;
        }
        let Some(next) = self.registry.next_unspawned_concept().cloned() else {
            warn!("no concepts left to spawn");
            return;
        };
        let Some(top) = self.table_top() else {
            warn!("concept spawn requested with no table in the scene");
            return;
        };

        let position = top + Vec3::new(0.0, CONCEPT_SPAWN_LIFT, 0.0);
        let facing = self.facing_user();
        self.registry.enable_concept(&next, position, facing);
        self.registry.register_concept_in_scene(next.clone());
        let mut is_model = false;
        if let Some(concept) = self.registry.concept_mut(&next) {
            concept.manipulable = true;
            is_model = concept.kind == ConceptKind::Object3d;
        }
        self.left_concepts_to_spawn -= 1;
        self.binder
            .attach_anchor(BoundObject::Concept(next.clone()), &self.registry, store);
        self.emit_audio(AudioCue::ObjectSpawned, self.table_position());
        self.events.emit(SessionEvent::ConceptRevealed {
            concept: next.clone(),
        });
        if is_model {
            self.events.emit(SessionEvent::RotatorShown { concept: next });
        }
        debug!(left = self.left_concepts_to_spawn, "concept spawned");
    }

    pub fn concept_grabbed(
        &mut self,
        concept: &ConceptId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.events.emit(SessionEvent::RotatorHidden);

        if self.phase == Phase::PlayingMain {
            if let Some(magnet) = self.magnet_of_concept(concept) {
                if let Some(slot) = self.slots.get_mut(&magnet) {
                    slot.is_being_held = true;
                }
            }
        }
        if self.phase == Phase::ConceptDistribution {
            if let Some(magnet) = self.magnet_of_concept(concept) {
                let position = self.registry.magnet(magnet).map(|magnet| magnet.position);
                self.emit_audio(AudioCue::MagnetDetach, position);
            }
        }

        self.binder.movement_started(
            &BoundObject::Concept(concept.clone()),
            &mut self.registry,
            store,
            gateway,
        );
    }

    pub fn concept_released(
        &mut self,
        concept: &ConceptId,
        position: Vec3,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(entity) = self.registry.concept_mut(concept) {
            entity.position = position;
        }

        if self.phase == Phase::PlayingMain {
            if let Some(magnet) = self.magnet_of_concept(concept) {
                if let Some(slot) = self.slots.get_mut(&magnet) {
                    slot.is_being_held = false;
                }
            }
        }

        match self.phase {
            Phase::ConceptDistribution => {
                self.concept_released_distribution(concept, store, gateway)
            }
            Phase::PlayingMain | Phase::PlayingFinal => {
                self.concept_released_playing(concept, store, gateway)
            }
            _ => {}
        }

        self.save_first_move_rotation(concept, gateway);
    }

    fn concept_released_distribution(
        &mut self,
        concept: &ConceptId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(previous) = self.magnet_of_concept(concept) {
            if let Some(slot) = self.slots.get_mut(&previous) {
                slot.associated_concept = None;
            }
        }

        match self.nearest_magnet_for_distribution(concept) {
            None => {
                debug!(concept = %concept, "concept released with no magnet near");
                self.binder.attach_anchor(
                    BoundObject::Concept(concept.clone()),
                    &self.registry,
                    store,
                );
            }
            Some(nearest) => {
                let evicted = self
                    .slots
                    .get_mut(&nearest)
                    .and_then(|slot| slot.associated_concept.replace(concept.clone()));
                let magnet_position = self.registry.magnet(nearest).map(|magnet| magnet.position);

                if let Some(evicted) = evicted {
                    debug!(evicted = %evicted, "previous concept evicted to the floor");
                    self.move_to_random_floor(&evicted, store, gateway);
                    self.emit_audio(AudioCue::MagnetSwap, magnet_position);
                } else {
                    self.emit_audio(AudioCue::MagnetAttach, magnet_position);
                }

                let facing = self.facing_user();
                if let (Some(entity), Some(position)) =
                    (self.registry.concept_mut(concept), magnet_position)
                {
                    entity.position = position;
                    entity.facing = facing;
                }
                self.binder.attach_anchor(
                    BoundObject::Concept(concept.clone()),
                    &self.registry,
                    store,
                );
                self.spawn_concept_if_possible(store);
            }
        }

        if self.all_concepts_associated() && self.left_concepts_to_spawn == 0 {
            if self.available_phases.insert(Phase::PlayingMain) {
                self.open_dialog(
                    "Playing Phase Available",
                    "You can now go to the table and select Playing phase.",
                    DialogKind::Generic,
                    true,
                );
            }
        } else {
            self.available_phases.remove(&Phase::PlayingMain);
        }
    }

    fn save_first_move_rotation(
        &mut self,
        concept: &ConceptId,
        gateway: &mut dyn PersistenceGateway,
    ) {
        let Some(entity) = self.registry.concept_mut(concept) else {
            return;
        };
        if entity.moved_once {
            return;
        }
        entity.moved_once = true;
        if entity.kind != ConceptKind::Object3d {
            return;
        }
        let rotation = entity.model_rotation.to_array();
        self.binder.save_rotation(concept.as_str(), rotation, gateway);
        debug!(concept = %concept, "model rotation saved on first move");
    }

    /// Scatters an object to a valid random floor position. When the object
    /// carried an anchor outside the play phases, the anchor follows the
    /// movement contract: erased on pickup, re-created shortly after landing.
    fn move_to_random_floor(
        &mut self,
        concept: &ConceptId,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        let in_play = matches!(self.phase, Phase::PlayingMain | Phase::PlayingFinal);
        let had_anchor = !in_play
            && self
                .registry
                .concept(concept)
                .is_some_and(|entity| entity.anchor.is_some());
        if had_anchor {
            self.binder.movement_started(
                &BoundObject::Concept(concept.clone()),
                &mut self.registry,
                store,
                gateway,
            );
        }

        let Some(size) = self.registry.concept(concept).map(|entity| entity.size) else {
            warn!(concept = %concept, "scatter requested for unknown concept");
            return;
        };
        let keepout = self.keepout_positions();
        let table_bounds = self.registry.table().map(|table| table.bounds());
        let query = PlacementQuery {
            room: &self.room,
            object_size: size,
            keepout: &keepout,
            table_bounds,
        };
        let placement = find_floor_placement(&mut self.rng, &self.user, &query);
        if let Some(entity) = self.registry.concept_mut(concept) {
            entity.position = placement.position;
        }

        if had_anchor {
            if placement.exhausted {
                self.binder.attach_anchor(
                    BoundObject::Concept(concept.clone()),
                    &self.registry,
                    store,
                );
            } else {
                self.timers.schedule(
                    TimerKind::ReanchorConcept {
                        concept: concept.clone(),
                    },
                    REANCHOR_AFTER_SCATTER_SECONDS,
                );
            }
        }
    }

    // ---- dialogs -----------------------------------------------------------

    fn open_dialog(&mut self, title: &str, message: &str, kind: DialogKind, auto_dismiss: bool) {
        if let Some(old) = self.dialog.take() {
            self.events
                .emit(SessionEvent::DialogDismissed { title: old.title });
        }
        self.events.emit(SessionEvent::DialogOpened {
            title: title.to_string(),
            kind,
        });
        self.dialog = Some(Dialog {
            title: title.to_string(),
            message: message.to_string(),
            kind,
            auto_dismiss,
            age_seconds: 0.0,
        });
    }

    /// User-initiated dismiss. A dismissed standings page pulls up the next
    /// one; dismissing the end-of-game question counts as declining it.
    pub fn dismiss_dialog(&mut self) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        let was_standings_page = dialog.kind == DialogKind::Standings;
        self.events
            .emit(SessionEvent::DialogDismissed { title: dialog.title });
        if was_standings_page && !self.interrupt_standings {
            self.open_next_standings_page();
        }
    }

    /// Answer to the end-of-game "publish your score?" dialog.
    pub fn dialog_response(&mut self, accept: bool, gateway: &mut dyn PersistenceGateway) {
        let is_request = self
            .dialog
            .as_ref()
            .is_some_and(|dialog| dialog.kind == DialogKind::RequestStandings);
        if !is_request {
            return;
        }
        self.dialog = None;
        if !accept {
            debug!("score not published");
            return;
        }
        self.standings
            .insert(self.config.user_name.clone(), self.score);
        if let Err(error) = gateway.save_standings(&self.standings) {
            warn!(error = %error, "standings save failed");
        }
        self.events.emit(SessionEvent::ScorePublished {
            user: self.config.user_name.clone(),
            score: self.score,
        });
    }

    fn update_dialog(&mut self, dt_seconds: f32) {
        let expired = match self.dialog.as_mut() {
            Some(dialog) if dialog.auto_dismiss => {
                dialog.age_seconds += dt_seconds;
                dialog.age_seconds >= DIALOG_AUTO_DISMISS_SECONDS
            }
            _ => false,
        };
        if expired {
            debug!("dialog auto-dismissed");
            self.dismiss_dialog();
        }
    }

    // ---- standings ---------------------------------------------------------

    fn start_standings_flow(&mut self) {
        self.interrupt_standings = false;
        self.standings_pages = standings_pages(&self.standings).into();
        if self.standings_pages.is_empty() {
            self.open_dialog(
                "STANDINGS",
                "No scores have been published yet.",
                DialogKind::Generic,
                true,
            );
            return;
        }
        self.open_next_standings_page();
    }

    fn open_next_standings_page(&mut self) {
        if let Some(page) = self.standings_pages.pop_front() {
            self.open_dialog("STANDINGS", &page, DialogKind::Standings, false);
        }
    }

    // ---- room boundary monitor ----------------------------------------------

    fn update_room_monitor(&mut self) {
        let in_room = self.room.is_position_in_room(self.user.position);
        let out_dialog_open = self
            .dialog
            .as_ref()
            .is_some_and(|dialog| dialog.kind == DialogKind::OutOfRoom);

        if !in_room && self.was_in_room && !out_dialog_open {
            self.interrupt_standings = true;
            self.standings_pages.clear();
            self.open_dialog(
                "OUT OF ROOM",
                "You are out of the room in which the experience is located, \
                 please go back to continue.",
                DialogKind::OutOfRoom,
                false,
            );
            self.was_in_room = false;
        }

        if in_room {
            self.was_in_room = true;
            self.interrupt_standings = false;
            if out_dialog_open {
                self.dismiss_dialog();
            }
        }
    }

    // ---- table menu ----------------------------------------------------------

    /// The physical button on the table: hides the scene objects and opens
    /// the phase menu, unless a dialog is already demanding attention.
    pub fn table_button_pressed(&mut self) {
        if self.dialog.is_some() {
            return;
        }
        self.set_objects_state(false, false);
        self.events.emit(SessionEvent::MenuOpened {
            available: self.available_phases.iter().copied().collect(),
        });
    }

    pub fn menu_button_pressed(
        &mut self,
        button: MenuButton,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        debug!(?button, "menu button pressed");
        match button {
            MenuButton::MagnetDistribution => {
                self.set_objects_state(true, true);
                if self.available_phases.contains(&Phase::MagnetDistribution) {
                    self.change_phase(Phase::MagnetDistribution, store, gateway);
                }
            }
            MenuButton::ConceptDistribution => {
                self.set_objects_state(true, true);
                if self.available_phases.contains(&Phase::ConceptDistribution) {
                    self.change_phase(Phase::ConceptDistribution, store, gateway);
                } else if !self.all_magnets_outside_table_space() {
                    self.open_dialog(
                        "WARNING",
                        "One or more magnets are too close to the table, move them away a bit.",
                        DialogKind::Generic,
                        true,
                    );
                } else {
                    self.open_dialog(
                        "WARNING",
                        "You have not completed the magnet distribution phase yet, \
                         please complete it before continuing.",
                        DialogKind::Generic,
                        true,
                    );
                }
            }
            MenuButton::Playing => {
                self.set_objects_state(true, true);
                if self.available_phases.contains(&Phase::PlayingMain) {
                    self.change_phase(Phase::PlayingMain, store, gateway);
                } else {
                    self.open_dialog(
                        "WARNING",
                        "You have not completed the concept distribution phase yet, \
                         please complete it before continuing.",
                        DialogKind::Generic,
                        true,
                    );
                }
            }
            MenuButton::Memorize => {
                self.set_objects_state(false, true);
                if self.available_phases.contains(&Phase::PlayingMain)
                    && self.phase == Phase::ConceptDistribution
                {
                    self.change_phase(Phase::Memorize, store, gateway);
                } else if !self.available_phases.contains(&Phase::PlayingMain) {
                    self.open_dialog(
                        "WARNING",
                        "You have not completed concept distribution yet, \
                         please complete it before continuing.",
                        DialogKind::Generic,
                        true,
                    );
                    self.set_objects_state(true, true);
                } else {
                    self.open_dialog(
                        "WARNING",
                        "You are in the playing phase, you cannot memorize concepts now. \
                         Go back to concept distribution phase.",
                        DialogKind::Generic,
                        true,
                    );
                    self.set_objects_state(true, true);
                }
            }
            MenuButton::Standings => {
                self.set_objects_state(true, true);
                if matches!(self.phase, Phase::PlayingMain | Phase::PlayingFinal) {
                    self.open_dialog(
                        "WARNING",
                        "You are in the playing phase, you cannot see the standings now.",
                        DialogKind::Generic,
                        true,
                    );
                } else {
                    self.start_standings_flow();
                }
            }
            MenuButton::RotateRight => self.rotate_last_concept(0.0, ROTATE_STEP_DEGREES),
            MenuButton::RotateLeft => self.rotate_last_concept(0.0, -ROTATE_STEP_DEGREES),
            MenuButton::RotateUp => self.rotate_last_concept(ROTATE_STEP_DEGREES, 0.0),
            MenuButton::RotateDown => self.rotate_last_concept(-ROTATE_STEP_DEGREES, 0.0),
        }
    }

    fn rotate_last_concept(&mut self, pitch_degrees: f32, yaw_degrees: f32) {
        let Some(last) = self.registry.concepts_in_scene().last().cloned() else {
            return;
        };
        let facing = self.facing_user();
        if let Some(entity) = self.registry.concept_mut(&last) {
            entity.facing = facing;
            let step = if pitch_degrees != 0.0 {
                Quat::from_pitch(pitch_degrees.to_radians())
            } else {
                Quat::from_yaw(yaw_degrees.to_radians())
            };
            entity.model_rotation = entity.model_rotation * step;
        }
    }

    fn set_objects_state(&mut self, magnets_shown: bool, concepts_shown: bool) {
        for magnet_id in self.registry.magnet_ids() {
            if let Some(magnet) = self.registry.magnet_mut(magnet_id) {
                magnet.active = magnets_shown;
            }
        }
        for concept_id in self.registry.concepts_in_scene().to_vec() {
            if let Some(concept) = self.registry.concept_mut(&concept_id) {
                concept.visible = concepts_shown;
            }
        }
    }

    fn emit_audio(&mut self, cue: AudioCue, position: Option<Vec3>) {
        self.events.emit(SessionEvent::Audio { cue, position });
    }
}
