//! Keyword-matched canned replies with simulated network latency

use super::{BackendReply, ChatBackend};
use crossbeam_channel::Sender;
use std::thread;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Checked in order, the first branch with a matching keyword wins
const BRANCHES: &[(&[&str], &str)] = &[
    (
        &["dieta"],
        "Sua dieta atual está focada em alimentos naturais e balanceados. Lembre-se de manter \
         as porções indicadas no seu plano e de fazer as refeições nos horários combinados.",
    ),
    (
        &["receita"],
        "Que tal uma omelete de espinafre com tomate? É rápida, rica em proteínas e combina \
         com o seu plano alimentar.",
    ),
    (
        &["água", "agua"],
        "O ideal é beber cerca de 35 ml de água por quilo de peso por dia. Tente distribuir \
         ao longo do dia e aumente nos dias de treino.",
    ),
    (
        &["proteína", "proteina"],
        "Boas fontes de proteína são ovos, frango, peixe, feijão e iogurte natural. Procure \
         incluir uma delas em cada refeição principal.",
    ),
    (
        &["substitu", "trocar"],
        "Você pode substituir o arroz branco por arroz integral ou quinoa, e o pão francês \
         por pão integral ou tapioca, mantendo a mesma porção.",
    ),
    (
        &["peso", "emagrec"],
        "A perda de peso saudável acontece de forma gradual. Mantenha a regularidade nas \
         refeições e registre seu progresso no acompanhamento.",
    ),
];

const DEFAULT_RESPONSE: &str = "Entendi sua mensagem. Posso ajudar com informações sobre seu \
     plano alimentar, receitas saudáveis, substituições de alimentos ou dúvidas nutricionais. \
     Como posso te ajudar?";

/// The reply the canned backend gives for `text`
pub fn canned_response(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    BRANCHES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, response)| *response)
        .unwrap_or(DEFAULT_RESPONSE)
}

/// Backend that answers from [`canned_response`] after a fixed delay
pub struct CannedBackend {
    latency: Duration,
}

impl CannedBackend {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for CannedBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl ChatBackend for CannedBackend {
    fn send_message(&mut self, request_id: Uuid, text: &str, replies: Sender<BackendReply>) {
        let response = canned_response(text);
        let latency = self.latency;
        debug!("Canned backend answering {} in {:?}", request_id, latency);
        thread::spawn(move || {
            thread::sleep(latency);
            let _ = replies.send(BackendReply::ok(request_id, response));
        });
    }
}
