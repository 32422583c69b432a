use super::hours::WorkingHours;
use crate::entity::{businesses, knowledge_base};

pub const NO_ANSWER_MARKER: &str = "[NO_ANSWER]";
pub const SCHEDULE_MARKER: &str = "[SCHEDULE_CALL]";

fn style_sentence(bot_style: &str) -> &'static str {
    match bot_style {
        "formal" => "formal and professional",
        "casual" => "casual and chatty",
        _ => "friendly and pleasant",
    }
}

fn knowledge_section(knowledge: &[knowledge_base::Model]) -> String {
    let entries: Vec<String> = knowledge
        .iter()
        .filter(|k| k.is_active)
        .map(|k| format!("Question: {}\nAnswer: {}\n---", k.question, k.answer))
        .collect();

    if entries.is_empty() {
        "No information in the knowledge base yet.".to_string()
    } else {
        entries.join("\n")
    }
}

pub fn build_prompt(
    business: &businesses::Model,
    knowledge: &[knowledge_base::Model],
    hours: &WorkingHours,
    customer_message: &str,
) -> String {
    let mut prompt = format!(
        "You are {}, the virtual assistant of {}.\n\
         Answer customers in a {} tone.\n\n",
        business.bot_name,
        business.business_name,
        style_sentence(&business.bot_style)
    );

    prompt.push_str("===== Knowledge base =====\n");
    prompt.push_str(&knowledge_section(knowledge));
    prompt.push_str("\n\n===== Working hours =====\n");
    prompt.push_str(&hours.describe());

    prompt.push_str(&format!(
        "\n\n===== Rules =====\n\
         1. If the answer is in the knowledge base, give a detailed and friendly answer in Hebrew.\n\
         2. If the answer is not in the knowledge base, reply with exactly: \"{}\"\n\
         3. If the customer wants to book a meeting or a call, reply with exactly: \"{}\"\n\
         4. Never invent information that is not in the knowledge base.\n\
         5. Do not ask unnecessary questions.\n\
         6. Answer in Hebrew only.\n\
         7. Use emojis to stay friendly.\n\n",
        NO_ANSWER_MARKER, SCHEDULE_MARKER
    ));

    prompt.push_str("===== Customer message =====\n");
    prompt.push_str(customer_message);
    prompt.push_str("\n\nReply with the answer only, without any preface or explanation.");
    prompt
}
