use crate::error::CaptionError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoraType {
    Character,
    Style,
    Concept,
}

/// Sub-choice for style datasets: tag lists or natural-language captions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleMode {
    Tags,
    #[default]
    Descriptive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionProfile {
    DetailedDescriptive,
    StyleTags,
    StyleDescriptive,
    StructuredDescriptive,
}

impl LoraType {
    pub fn instruction_profile(self, style_mode: StyleMode) -> InstructionProfile {
        match (self, style_mode) {
            (LoraType::Character, _) => InstructionProfile::DetailedDescriptive,
            (LoraType::Style, StyleMode::Tags) => InstructionProfile::StyleTags,
            (LoraType::Style, StyleMode::Descriptive) => InstructionProfile::StyleDescriptive,
            (LoraType::Concept, _) => InstructionProfile::StructuredDescriptive,
        }
    }
}

impl InstructionProfile {
    pub fn name(self) -> &'static str {
        match self {
            InstructionProfile::DetailedDescriptive => "detailed descriptive",
            InstructionProfile::StyleTags => "style tags",
            InstructionProfile::StyleDescriptive => "style descriptive",
            InstructionProfile::StructuredDescriptive => "structured descriptive",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            InstructionProfile::DetailedDescriptive => {
                "Describe this image in detail as a caption for training an image model. \
                 Cover the subject's appearance, clothing, pose and expression, then the setting. \
                 Write one paragraph of plain prose with no preamble."
            }
            InstructionProfile::StyleTags => {
                "List comma-separated tags for this image: subject, composition, medium, \
                 color palette and lighting. Output only the tags."
            }
            InstructionProfile::StyleDescriptive => {
                "Describe what this image shows in one or two sentences, focusing on content and \
                 composition. Do not name the artistic style. Output only the description."
            }
            InstructionProfile::StructuredDescriptive => {
                "Describe this image in order: the main subject, then the action or idea it shows, \
                 then the setting and notable details. Write plain sentences with no headings or preamble."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Generated { raw_text: String, final_text: String },
    Failed(CaptionError),
}

/// Produced once per dispatched image and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionResult {
    pub image_ref: String,
    pub instruction_used: InstructionProfile,
    pub attempts: u32,
    pub outcome: CaptionOutcome,
}

impl CaptionResult {
    pub fn final_text(&self) -> Option<&str> {
        match &self.outcome {
            CaptionOutcome::Generated { final_text, .. } => Some(final_text),
            CaptionOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CaptionError> {
        match &self.outcome {
            CaptionOutcome::Failed(err) => Some(err),
            CaptionOutcome::Generated { .. } => None,
        }
    }
}
