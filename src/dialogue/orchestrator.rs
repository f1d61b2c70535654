//! Per-request driver for the dialogue pipeline.
//!
//! Chat path: compact history, detect a talent request, check the persona's
//! skill, apply the flow-hint nudge, then call the chat collaborator.
//! Speech path: expressive transform, then the TTS collaborator with a text
//! fallback on failure.

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::compactor::HistoryCompactor;
use super::expressive;
use super::skill::{SkillDirective, SkillStateStore, SkillTriggerEngine};
use super::talent::{detect_talent, matched_trigger};
use crate::error::DialogueError;
use crate::persona::PersonaId;
use crate::providers::{ChatCollaborator, GenerationParams, SpeechCollaborator, SynthesisParams};
use crate::types::{FlowHint, Role, Turn};

/// System prompt used when the caller sends none and the persona is unknown.
pub const FALLBACK_SYSTEM_PROMPT: &str =
    "You are a friendly role-play companion. Stay in character and keep replies short.";

/// Incoming chat turn list plus generation overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "messages")]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub persona: PersonaId,
    #[serde(default)]
    pub flow_hint: FlowHint,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(persona: PersonaId, turns: Vec<Turn>) -> Self {
        Self {
            turns,
            persona,
            flow_hint: FlowHint::Normal,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// What the pipeline did to the outbound prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Augmentation {
    pub persona: PersonaId,
    pub original_turns: usize,
    pub retained_turns: usize,
    /// Trigger phrase that activated the persona's talent.
    pub talent: Option<&'static str>,
    pub skill: Option<SkillDirective>,
    pub flow_hint: FlowHint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub message: Turn,
    pub augmentation: Augmentation,
}

/// Per-request overrides of the persona's default voice.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VoiceOverrides {
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub volume: Option<f32>,
    pub pitch: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub persona: PersonaId,
    #[serde(default, rename = "tts_config")]
    pub voice: VoiceOverrides,
}

/// Result of the speech path. Never an error once the text is valid.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechOutcome {
    Audio {
        audio: Vec<u8>,
        voice: String,
        speed: f32,
    },
    /// Synthesis failed; the caller should speak `text` some other way.
    Fallback { text: String },
}

/// Drives both request paths against injected collaborators.
pub struct Orchestrator {
    chat: Arc<dyn ChatCollaborator>,
    speech: Arc<dyn SpeechCollaborator>,
    compactor: HistoryCompactor,
    skills: SkillTriggerEngine,
    generation: GenerationParams,
    rng: Mutex<StdRng>,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<dyn ChatCollaborator>,
        speech: Arc<dyn SpeechCollaborator>,
        generation: GenerationParams,
        retention_budget: usize,
    ) -> Self {
        Self {
            chat,
            speech,
            compactor: HistoryCompactor::new(retention_budget),
            skills: SkillTriggerEngine::new(Arc::new(SkillStateStore::new())),
            generation,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reseed for reproducible skill draws and expressive output.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Share a cooldown store with other engines.
    pub fn with_skill_store(mut self, store: Arc<SkillStateStore>) -> Self {
        self.skills = SkillTriggerEngine::new(store);
        self
    }

    pub fn skill_store(&self) -> &Arc<SkillStateStore> {
        self.skills.store()
    }

    pub fn retention_budget(&self) -> usize {
        self.compactor.budget()
    }

    /// Build the outbound prompt without calling the model.
    ///
    /// Advances the persona's skill cooldown when a skill fires.
    pub fn prepare(&self, request: &ChatRequest) -> Result<(Vec<Turn>, Augmentation), DialogueError> {
        if request.turns.is_empty() {
            return Err(DialogueError::InvalidMessages);
        }
        let persona = request.persona;
        let original_turns = request.turns.len();

        let mut turns = request.turns.clone();
        if turns[0].role != Role::System {
            let prompt = persona
                .profile()
                .map(|p| p.system_prompt)
                .unwrap_or(FALLBACK_SYSTEM_PROMPT);
            turns.insert(0, Turn::system(prompt));
        }

        let mut turns = self.compactor.compact(turns);
        let retained_turns = turns.len();

        let last_user = turns
            .iter()
            .rev()
            .find(|t| t.is_user())
            .map(|t| t.content.clone())
            .unwrap_or_default();
        let talent = matched_trigger(persona, &last_user);
        if let Cow::Owned(extended) = detect_talent(persona, &last_user, &turns[0].content) {
            turns[0].content = extended;
        }

        // Cooldowns count user turns of the full history; compaction would
        // otherwise make the count go backwards.
        let skill = {
            let mut rng = self.rng.lock();
            self.skills.check_skill(persona, &request.turns, &mut *rng)
        };
        if let Some(directive) = &skill {
            turns[0].content.push_str(&directive.block());
        }

        if let Some(nudge) = request.flow_hint.nudge() {
            turns[0].content.push_str("\n\n[Flow]\n");
            turns[0].content.push_str(nudge);
        }

        Ok((
            turns,
            Augmentation {
                persona,
                original_turns,
                retained_turns,
                talent,
                skill,
                flow_hint: request.flow_hint,
            },
        ))
    }

    /// Run the chat path end to end.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply, DialogueError> {
        let (turns, augmentation) = self.prepare(&request)?;

        let mut params = self.generation.clone();
        if let Some(t) = request.temperature {
            params.temperature = t;
        }
        if let Some(m) = request.max_tokens {
            params.max_tokens = m;
        }

        info!(
            persona = %augmentation.persona,
            original = augmentation.original_turns,
            retained = augmentation.retained_turns,
            talent = augmentation.talent.is_some(),
            skill = augmentation.skill.as_ref().map(|s| s.skill),
            "dispatching chat turn"
        );

        let message = self.chat.complete(&turns, &params).await.map_err(|e| {
            warn!(persona = %augmentation.persona, error = %e, "chat provider failed");
            DialogueError::from(e)
        })?;

        Ok(ChatReply {
            message,
            augmentation,
        })
    }

    /// Resolve synthesis settings: caller overrides win over persona defaults.
    pub fn synthesis_params(persona: PersonaId, overrides: &VoiceOverrides) -> SynthesisParams {
        let (voice, speed, volume, pitch) = match persona.profile() {
            Some(p) => (p.voice.voice, p.voice.speed, p.voice.volume, p.voice.pitch),
            None => ("alloy", 1.0, 1.0, 1.0),
        };
        SynthesisParams {
            voice: overrides.voice.clone().unwrap_or_else(|| voice.to_string()),
            speed: overrides.speed.unwrap_or(speed),
            volume: overrides.volume.unwrap_or(volume),
            pitch: overrides.pitch.unwrap_or(pitch),
        }
    }

    /// Run the speech path.
    ///
    /// Only empty text is an error; provider failures yield
    /// [`SpeechOutcome::Fallback`] carrying the untransformed text.
    pub async fn speak(&self, request: SpeechRequest) -> Result<SpeechOutcome, DialogueError> {
        if request.text.trim().is_empty() {
            return Err(DialogueError::MissingText);
        }

        let spoken = {
            let mut rng = self.rng.lock();
            expressive::speak(&request.text, request.persona, &mut *rng)
        };
        let params = Self::synthesis_params(request.persona, &request.voice);
        debug!(
            persona = %request.persona,
            voice = %params.voice,
            transformed = spoken != request.text,
            "synthesizing speech"
        );

        match self.speech.synthesize(&spoken, &params).await {
            Ok(audio) => Ok(SpeechOutcome::Audio {
                audio,
                voice: params.voice,
                speed: params.speed,
            }),
            Err(e) => {
                warn!(persona = %request.persona, error = %e, "tts failed, falling back to text");
                Ok(SpeechOutcome::Fallback { text: request.text })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dialogue::talent::directive_block;
    use crate::providers::ProviderError;
    use async_trait::async_trait;

    /// Echoes the system prompt back and records what it was sent.
    #[derive(Default)]
    pub(crate) struct MockChat {
        pub fail: bool,
        pub seen: Mutex<Vec<Vec<Turn>>>,
    }

    #[async_trait]
    impl ChatCollaborator for MockChat {
        async fn complete(
            &self,
            turns: &[Turn],
            _params: &GenerationParams,
        ) -> Result<Turn, ProviderError> {
            self.seen.lock().push(turns.to_vec());
            if self.fail {
                return Err(ProviderError::Status {
                    status: 502,
                    body: "upstream down".into(),
                });
            }
            Ok(Turn::assistant("Well met, traveller."))
        }
    }

    #[derive(Default)]
    pub(crate) struct MockSpeech {
        pub fail: bool,
        pub seen: Mutex<Vec<(String, SynthesisParams)>>,
    }

    #[async_trait]
    impl SpeechCollaborator for MockSpeech {
        async fn synthesize(
            &self,
            text: &str,
            params: &SynthesisParams,
        ) -> Result<Vec<u8>, ProviderError> {
            self.seen.lock().push((text.to_string(), params.clone()));
            if self.fail {
                return Err(ProviderError::Malformed("no audio".into()));
            }
            Ok(vec![0xFF, 0xFB, 0x90])
        }
    }

    fn orchestrator(chat: Arc<MockChat>, speech: Arc<MockSpeech>) -> Orchestrator {
        Orchestrator::new(chat, speech, GenerationParams::new("test-model"), 3000).with_seed(7)
    }

    #[tokio::test]
    async fn test_empty_turns_rejected_without_side_effects() {
        let chat = Arc::new(MockChat::default());
        let orch = orchestrator(chat.clone(), Arc::new(MockSpeech::default()));

        let err = orch
            .chat(ChatRequest::new(PersonaId::Bard, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::InvalidMessages));
        assert!(chat.seen.lock().is_empty());
        assert_eq!(orch.skill_store().get(PersonaId::Bard).last_trigger_turn, 0);
    }

    #[tokio::test]
    async fn test_talent_extends_system_prompt_by_directive() {
        let chat = Arc::new(MockChat::default());
        let orch = orchestrator(chat.clone(), Arc::new(MockSpeech::default()));
        let prompt = "You are Lirien.";
        let request = ChatRequest::new(
            PersonaId::Bard,
            vec![Turn::system(prompt), Turn::user("sing for me")],
        );

        let reply = orch.chat(request).await.unwrap();
        assert_eq!(reply.message, Turn::assistant("Well met, traveller."));
        assert_eq!(reply.augmentation.talent, Some("sing for me"));
        // One user turn is below the bard's cooldown, so only the talent applies.
        assert!(reply.augmentation.skill.is_none());

        let sent = chat.seen.lock()[0][0].content.clone();
        let block = directive_block(PersonaId::Bard.profile().unwrap());
        assert_eq!(sent.len(), prompt.len() + block.len());
        assert!(sent.ends_with(&block));
    }

    #[tokio::test]
    async fn test_missing_system_turn_is_inserted() {
        let chat = Arc::new(MockChat::default());
        let orch = orchestrator(chat.clone(), Arc::new(MockSpeech::default()));
        orch.chat(ChatRequest::new(PersonaId::Detective, vec![Turn::user("hello")]))
            .await
            .unwrap();

        let sent = &chat.seen.lock()[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0]
            .content
            .starts_with(PersonaId::Detective.profile().unwrap().system_prompt));
    }

    #[tokio::test]
    async fn test_skill_cooldown_spent_even_when_provider_fails() {
        let chat = Arc::new(MockChat {
            fail: true,
            ..MockChat::default()
        });
        let orch = orchestrator(chat.clone(), Arc::new(MockSpeech::default()));
        let turns = vec![
            Turn::system("You are Lirien."),
            Turn::user("I feel great today"),
            Turn::assistant("Lovely!"),
            Turn::user("the sun is out"),
            Turn::assistant("Indeed."),
            Turn::user("I am so happy"),
        ];

        let err = orch
            .chat(ChatRequest::new(PersonaId::Bard, turns))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LLM_SERVICE_ERROR");
        assert_eq!(orch.skill_store().get(PersonaId::Bard).last_trigger_turn, 3);
        assert!(chat.seen.lock()[0][0].content.contains("[Skill: "));
    }

    #[tokio::test]
    async fn test_flow_hint_and_overrides_reach_prompt() {
        let chat = Arc::new(MockChat::default());
        let orch = orchestrator(chat.clone(), Arc::new(MockSpeech::default()));
        let mut request = ChatRequest::new(
            PersonaId::Unknown,
            vec![Turn::system("Be brief."), Turn::user("...")],
        );
        request.flow_hint = FlowHint::NeedTopicChange;

        let reply = orch.chat(request).await.unwrap();
        assert!(reply.augmentation.skill.is_none());
        assert!(reply.augmentation.talent.is_none());
        let sent = &chat.seen.lock()[0][0].content;
        assert!(sent.starts_with("Be brief.\n\n[Flow]\n"));
        assert!(sent.ends_with(FlowHint::NeedTopicChange.nudge().unwrap()));
    }

    #[tokio::test]
    async fn test_long_history_is_compacted_before_sending() {
        let chat = Arc::new(MockChat::default());
        let orch = Orchestrator::new(
            chat.clone(),
            Arc::new(MockSpeech::default()),
            GenerationParams::new("m"),
            50,
        );
        let mut turns = vec![Turn::system("sys")];
        for i in 0..20 {
            turns.push(Turn::user(format!("message number {i} with some padding text")));
            turns.push(Turn::assistant(format!("reply number {i} with some padding text")));
        }

        let reply = orch
            .chat(ChatRequest::new(PersonaId::Unknown, turns))
            .await
            .unwrap();
        assert_eq!(reply.augmentation.original_turns, 41);
        assert!(reply.augmentation.retained_turns <= 12);
        assert_eq!(chat.seen.lock()[0].len(), reply.augmentation.retained_turns);
    }

    #[tokio::test]
    async fn test_speak_uses_persona_voice_and_overrides() {
        let speech = Arc::new(MockSpeech::default());
        let orch = orchestrator(Arc::new(MockChat::default()), speech.clone());
        let request = SpeechRequest {
            text: "Hold the line.".into(),
            persona: PersonaId::Commander,
            voice: VoiceOverrides {
                speed: Some(1.2),
                ..VoiceOverrides::default()
            },
        };

        match orch.speak(request).await.unwrap() {
            SpeechOutcome::Audio { audio, voice, speed } => {
                assert_eq!(audio, vec![0xFF, 0xFB, 0x90]);
                assert_eq!(voice, "onyx");
                assert_eq!(speed, 1.2);
            }
            other => panic!("expected audio, got {other:?}"),
        }
        // Commander emphasis always strengthens the terminal.
        let (sent, _) = speech.seen.lock()[0].clone();
        assert!(sent.contains('!'));
    }

    #[tokio::test]
    async fn test_speak_falls_back_with_original_text() {
        let speech = Arc::new(MockSpeech {
            fail: true,
            ..MockSpeech::default()
        });
        let orch = orchestrator(Arc::new(MockChat::default()), speech);
        let text = "Hello there. How are you?";
        let outcome = orch
            .speak(SpeechRequest {
                text: text.into(),
                persona: PersonaId::Bard,
                voice: VoiceOverrides::default(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, SpeechOutcome::Fallback { text: text.into() });
    }

    #[tokio::test]
    async fn test_speak_rejects_blank_text() {
        let speech = Arc::new(MockSpeech::default());
        let orch = orchestrator(Arc::new(MockChat::default()), speech.clone());
        let err = orch
            .speak(SpeechRequest {
                text: "   ".into(),
                persona: PersonaId::Bard,
                voice: VoiceOverrides::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::MissingText));
        assert!(speech.seen.lock().is_empty());
    }

    #[test]
    fn test_unknown_persona_voice_defaults() {
        let params = Orchestrator::synthesis_params(PersonaId::Unknown, &VoiceOverrides::default());
        assert_eq!(params.voice, "alloy");
        assert_eq!(params.speed, 1.0);
    }
}
