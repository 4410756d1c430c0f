/// Number of outputs of the fine-tuned classification head.
pub const NUM_CLASSES: usize = 41;

/// Species names in the order of the model's output layer.
///
/// Index `i` of the model output corresponds to `CLASS_NAMES[i]`. The order is
/// fixed at training time; `model::TfClassifier::load` checks the output width
/// against [`NUM_CLASSES`] but cannot check the order itself.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Banded Kukri Snake",
    "Barred Wolf Snake",
    "Beaked Sea Snake",
    "Black-Headed Snake",
    "Blossom Krait",
    "Boie's Rough-sided Snake",
    "Boulenger's Bronzeback",
    "Boulenger's Keelback",
    "Brahminy Blindsnake",
    "Buff Striped Keelback",
    "Ceylon Krait",
    "Ceylon Wolf Snake",
    "Ceylonese Cylinder Snake",
    "Cobra",
    "Common Bronzeback Tree Snake",
    "Common Krait",
    "Common Rough-sided Snake",
    "Dumaril's Kukri Snake",
    "Forsten's Cat Snake",
    "Golden Tree Snake",
    "Green Keelback",
    "Hypnale Hypnale",
    "Indian Wolf Snake",
    "Long-nosed Whipsnake",
    "Lowland Hump-nosed Viper",
    "Oriental Rat Snake",
    "Ranawana's Cat Snake",
    "Rock Python",
    "Russel-s Viper",
    "Russell's Wolf Snake",
    "Schokar's Bronzeback",
    "Sinharaja Tree Snake",
    "Slender Coralsnake",
    "Spectacled Cobra",
    "Sri Lankan Cat Snake",
    "Sri Lankan Flying Snake",
    "Sri Lankan Green Pit Viper",
    "Sri Lankan Keelback",
    "Sri Lankan Krait",
    "Sri Lankan Pipe Snake",
    "Trinket Snake",
];

/// Trimmed species name for an output index.
pub fn label_for(index: usize) -> Option<&'static str> {
    CLASS_NAMES.get(index).copied().map(str::trim)
}
