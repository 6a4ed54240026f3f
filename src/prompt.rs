//! Prompt construction for outline generation.

/// Schema the model is asked to follow, in the notation it understands best.
pub const SLIDE_SCHEMA: &str =
    "Slide = {id:int, title:str, points:list(str), image_keywords:list(str)}";

/// Build the outline request sent to the language model.
///
/// The slide count is passed through verbatim; callers validate it.
pub fn outline_prompt(topic: &str, num_slides: &str, instructions: &str) -> String {
    let mut prompt = format!(
        "Using the prompt {topic} create a presentation with exactly {num_slides} slides. \
         For every slide include relevant image keywords and appropriate bullet points. \
         Include no other text except for the JSON.\n"
    );

    let instructions = instructions.trim();
    if !instructions.is_empty() {
        prompt.push_str(&format!(
            "Also make sure to keep these instructions in mind: {instructions}\n"
        ));
    }

    prompt.push_str(&format!(
        "Use this JSON schema:\n    {SLIDE_SCHEMA}\nReturn a `list[Slide]`"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_topic_count_and_schema() {
        let prompt = outline_prompt("Intro to Oceans", "2", "");
        assert!(prompt.contains("Intro to Oceans"));
        assert!(prompt.contains("exactly 2 slides"));
        assert!(prompt.contains(SLIDE_SCHEMA));
        assert!(prompt.ends_with("Return a `list[Slide]`"));
    }

    #[test]
    fn instructions_only_when_present() {
        let without = outline_prompt("Volcanoes", "3", "   ");
        assert!(!without.contains("instructions in mind"));

        let with = outline_prompt("Volcanoes", "3", "Aim at ten year olds");
        assert!(with.contains("instructions in mind: Aim at ten year olds"));
    }

    #[test]
    fn count_is_passed_through_verbatim() {
        let prompt = outline_prompt("Deserts", "0", "");
        assert!(prompt.contains("exactly 0 slides"));
    }
}
