//! Canned oracle readings. The oracles never had algorithmic depth: each
//! consultation draws from a fixed pool per oracle type, optionally colored
//! by an entity the question mentions by name.

use rand::seq::SliceRandom;

static TAROT: &[&str] = &[
    "A Torre cai diante de ti; o que ruir esta semana abre caminho ao que deve erguer-se.",
    "O Enforcado te observa: a resposta exige que inverta a pergunta.",
    "A Sacerdotisa guarda silêncio; procura o que foi escondido entre as páginas que já leste.",
    "O Louco dá o primeiro passo no escuro, e o abismo lhe devolve um mapa.",
];

static MIRROR: &[&str] = &[
    "O espelho negro devolve um rosto que ainda não reconheces como teu.",
    "Atrás do teu reflexo, uma porta entreaberta; não fostes tu quem a abriu.",
    "A superfície treme: aquilo que buscas também te procura.",
];

static RUNES: &[&str] = &[
    "Isa congela o caminho; espera o degelo antes de agir.",
    "Kenaz arde na pedra: a chama que carregas pede combustível, não abrigo.",
    "Hagalaz anuncia granizo; o que for destruído não era fundação.",
    "Ansuz fala por bocas alheias; escuta quem te interrompe.",
];

static FIRE: &[&str] = &[
    "As chamas dobram-se para o oeste: a resposta está no que deixaste para trás.",
    "O fogo lambe a oferenda e aceita; teu pedido foi ouvido.",
    "Fagulhas sobem em espiral, sinal de vontade dividida. Escolhe, e o fogo se aquieta.",
];

static VOICE: &[&str] = &[
    "A voz do abismo não responde perguntas; devolve ecos do que já sabes.",
    "Do fundo sobe um sussurro: o preço já foi pago, falta apenas coragem de cobrar.",
    "O abismo pronuncia teu nome de trás para frente; desfaz o nó e entenderás.",
];

// Unknown oracle types still get a reading, at the default cost.
static ABYSS: &[&str] = &[
    "O abismo recebe tua pergunta e a guarda entre as que não têm pressa.",
    "Nem todo oráculo tem nome; este respondeu mesmo assim.",
];

static DAILY: &[&str] = &[
    "A consulta do dia: caminha hoje como quem já conhece o fim do caminho.",
    "O abismo concede uma resposta gratuita: guarda silêncio na hora da dúvida.",
    "Presságio do dia: o que chega sem ser chamado traz a lição mais cara.",
];

/// Entities the oracle recognizes by name in the question.
static ENTITY_LINES: &[(&str, &str)] = &[
    ("lilith", "Lilith atende antes da pergunta terminar."),
    ("belial", "Belial ri, e a terra sob teus pés toma partido."),
    ("lucifer", "Lúcifer acende a lamparina que juraste ter perdido."),
    ("leviathan", "Leviatã se move nas águas fundas da tua pergunta."),
    ("abaddon", "Abaddon abre o poço e espera que olhes para dentro."),
];

pub fn draw(oracle_type: &str) -> &'static str {
    let pool = match oracle_type {
        "tarot" => TAROT,
        "mirror" => MIRROR,
        "runes" => RUNES,
        "fire" => FIRE,
        "voice" => VOICE,
        _ => ABYSS,
    };
    pool.choose(&mut rand::thread_rng()).copied().unwrap_or(ABYSS[0])
}

pub fn daily() -> &'static str {
    DAILY.choose(&mut rand::thread_rng()).copied().unwrap_or(DAILY[0])
}

pub fn entity_line(question: &str) -> Option<&'static str> {
    let q = question.to_lowercase();
    ENTITY_LINES
        .iter()
        .find(|(name, _)| q.contains(name))
        .map(|(_, line)| *line)
}

pub fn compose(oracle_type: &str, question: &str) -> String {
    match entity_line(question) {
        Some(line) => format!("{line} {}", draw(oracle_type)),
        None => draw(oracle_type).to_string(),
    }
}
