//! Instruction templates for the graph operations.
//!
//! Every structured operation instructs the model to answer with bare JSON.

use crate::providers::CompletionRequest;

const EXTRACT_INSTRUCTION: &str = "You extract knowledge graphs from text. \
Identify the entities (people, places, organizations, concepts, events) and \
the relationships between them. Respond with JSON only, no prose, shaped as \
{\"nodes\": [{\"localId\": string, \"name\": string, \"type\": string, \
\"desc\": string}], \"edges\": [{\"sourceLocalId\": string, \
\"targetLocalId\": string, \"relationship\": string}]}. \
localId values are arbitrary but must be consistent between nodes and edges. \
desc is a short factual description of the entity as stated in the text.";

pub fn extract_graph(text: &str) -> CompletionRequest {
    CompletionRequest::new(
        EXTRACT_INSTRUCTION,
        format!("Extract the knowledge graph from:\n\n{}", text),
    )
}

pub fn merge_descriptions(a: &str, b: &str) -> CompletionRequest {
    CompletionRequest::new(
        "You merge two descriptions of the same entity into one concise \
         description that keeps every distinct fact. Respond with the merged \
         description only, no preamble.",
        format!("Description 1: {}\nDescription 2: {}", a, b),
    )
}

pub fn infer_relation(desc_a: &str, desc_b: &str) -> CompletionRequest {
    CompletionRequest::new(
        "You judge whether two described entities are directly related. \
         Respond with JSON only: {\"related\": bool, \"source\": \
         \"node1\"|\"node2\", \"relationship\": string}. \"node1\" means \
         the first entity is the source of the relationship. If unrelated, \
         set related to false and leave relationship empty.",
        format!("Entity 1: {}\nEntity 2: {}", desc_a, desc_b),
    )
}

pub fn summarize_community(member_block: &str) -> CompletionRequest {
    CompletionRequest::new(
        "You summarize a group of related entities from a knowledge graph. \
         Write a short paragraph capturing what connects them and the key facts. \
         Respond with the summary only.",
        member_block,
    )
}

pub fn summarize_global(community_block: &str) -> CompletionRequest {
    CompletionRequest::new(
        "You synthesize an overview of a knowledge corpus from its community \
         summaries. Write a concise global summary. Respond with the summary only.",
        community_block,
    )
}

pub fn answer(subgraph_json: &str, question: &str) -> CompletionRequest {
    CompletionRequest::new(
        "You answer questions using a knowledge subgraph given as JSON. \
         Base the answer on the nodes and edges provided; if the subgraph does \
         not contain the information, say so.",
        format!("Subgraph:\n{}\n\nQuestion: {}", subgraph_json, question),
    )
}
