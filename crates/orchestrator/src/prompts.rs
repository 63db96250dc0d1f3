//! Prompt text for every agent decision and the reflection stages

use mafia_core::{Cheatsheet, Role};

pub const SPEECH_FALLBACK: &str = "I have nothing to add at this time.";

/// What an agent knows when it is asked to act.
#[derive(Debug, Clone)]
pub struct GameContext<'a> {
    pub player_count: usize,
    pub day_number: u32,
    pub alive: &'a [String],
    pub dead: &'a [String],
    pub player_name: &'a str,
    pub role: Role,
    /// Other mafia members; only rendered for mafia players.
    pub mafia_partners: &'a [String],
    /// Pre-rendered cheatsheet.
    pub cheatsheet: &'a str,
    pub discussion: &'a [String],
}

fn list_or(names: &[String], empty: &str) -> String {
    if names.is_empty() {
        empty.to_string()
    } else {
        names.join(", ")
    }
}

fn role_info(role: Role, mafia_partners: &[String]) -> String {
    match role {
        Role::Mafia => format!(
            r#"As Mafia, your goal is to eliminate all town players without being caught.
- You know who your fellow Mafia members are: {partners}
- At night, you choose one player to kill
- During the day, blend in and deflect suspicion onto innocent players"#,
            partners = list_or(mafia_partners, "none (you're alone)")
        ),
        Role::Doctor => r#"As Doctor, your goal is to protect innocent players.
- Each night, you choose one player to protect from the Mafia
- If the Mafia targets the player you protected, they survive
- You can protect yourself"#
            .to_string(),
        Role::Deputy => r#"As Deputy, your goal is to identify the Mafia.
- Each night, you investigate one player
- You learn if they are "good" (Town) or "bad" (Mafia)
- Use this information carefully - revealing yourself makes you a target"#
            .to_string(),
        Role::Townsperson => r#"As Townsperson, your goal is to identify and eliminate the Mafia.
- You have no special abilities
- Use discussion and voting to find suspicious players
- Pay attention to voting patterns and contradictions"#
            .to_string(),
    }
}

impl GameContext<'_> {
    pub fn render(&self) -> String {
        let discussion = if self.discussion.is_empty() {
            "(No discussion yet)".to_string()
        } else {
            self.discussion.join("\n")
        };
        format!(
            r#"You are playing a game of Mafia with {num_players} players.

CURRENT GAME STATE:
- Day {day_number}
- Alive players: {alive}
- Dead players: {dead}

YOUR IDENTITY:
- Name: {name}
- Role: {role}
{role_info}

YOUR CHEATSHEET (strategies you've learned):
{cheatsheet}

DISCUSSION SO FAR TODAY:
{discussion}"#,
            num_players = self.player_count,
            day_number = self.day_number,
            alive = list_or(self.alive, "None"),
            dead = list_or(self.dead, "None"),
            name = self.player_name,
            role = self.role,
            role_info = role_info(self.role, self.mafia_partners),
            cheatsheet = self.cheatsheet,
            discussion = discussion,
        )
    }
}

/// Renders every item with its id so reviewers can reference it.
pub fn render_for_review(cheatsheet: &Cheatsheet) -> String {
    if cheatsheet.items.is_empty() {
        return "No strategies accumulated yet.".to_string();
    }
    cheatsheet
        .items
        .iter()
        .map(|item| {
            format!(
                "- [{}] ({}, score {:.2}) {}",
                item.id, item.category, item.helpfulness_score, item.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct AgentPrompts;

impl AgentPrompts {
    pub fn speech_system(ctx: &GameContext<'_>) -> String {
        format!(
            r#"You are {name}, a player in a game of Mafia. Give a speech to the group.

{context}

Your speech should:
1. Be 2-4 sentences
2. Sound natural and in-character
3. Advance your goals based on your role
4. Reference what others have said if relevant

The "addressing" field should list players you're directly responding to or accusing."#,
            name = ctx.player_name,
            context = ctx.render()
        )
    }

    pub fn speech_user() -> &'static str {
        "Give your speech now."
    }

    pub fn vote_system(ctx: &GameContext<'_>) -> String {
        format!(
            r#"You are {name}. It's time to vote on who to lynch.

{context}

Based on the discussion, choose who to vote for. You may also vote "no_lynch" if you don't want anyone lynched."#,
            name = ctx.player_name,
            context = ctx.render()
        )
    }

    pub fn vote_user(valid_targets: &[String]) -> String {
        format!(
            "Cast your vote. Valid targets: {}, or 'no_lynch'",
            valid_targets.join(", ")
        )
    }

    pub fn mafia_kill_system(ctx: &GameContext<'_>) -> String {
        format!(
            r#"You are {name}, a Mafia member. It's night time - choose who to kill.

{context}

Consider:
- Who is most dangerous to the Mafia (Deputy, active investigators)?
- Who might the Doctor protect?
- Who can you eliminate without raising suspicion?"#,
            name = ctx.player_name,
            context = ctx.render()
        )
    }

    pub fn doctor_save_system(ctx: &GameContext<'_>) -> String {
        format!(
            r#"You are {name}, the Doctor. It's night time - choose who to protect.

{context}

Consider:
- Who is the Mafia most likely to target?
- Who is most valuable to the town?
- Should you protect yourself?"#,
            name = ctx.player_name,
            context = ctx.render()
        )
    }

    pub fn deputy_investigate_system(ctx: &GameContext<'_>) -> String {
        format!(
            r#"You are {name}, the Deputy. It's night time - choose who to investigate.

{context}

Consider:
- Who has been acting suspiciously?
- Who haven't you investigated yet?
- Who would give you the most useful information?"#,
            name = ctx.player_name,
            context = ctx.render()
        )
    }

    pub fn night_user(verb: &str, valid_targets: &[String]) -> String {
        format!(
            "Choose who to {}. Valid targets: {}",
            verb,
            valid_targets.join(", ")
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reflector_system(
        player_name: &str,
        player_id: &str,
        role: Role,
        won: bool,
        winner: &str,
        survived: bool,
        cheatsheet: &str,
        game_log: &str,
    ) -> String {
        format!(
            r#"You are analyzing a completed Mafia game for player {player_name}.
Your job is to identify lessons learned and suggest updates to their strategy cheatsheet.

PLAYER ID: {player_id}
PLAYER'S ROLE THIS GAME: {role}
GAME OUTCOME: {outcome} ({winner} won)
PLAYER SURVIVED: {survived}

CURRENT CHEATSHEET:
{cheatsheet}

GAME LOG (what this player could observe):
{game_log}

Analyze the game and suggest cheatsheet updates. Consider:
1. What strategies worked well?
2. What mistakes were made?
3. What patterns did you notice in other players?
4. What should be remembered for future games?

Each delta is "add" (with item), "update" (with item_id and item) or "remove" (with item_id).
Set source_event to the specific moment in the log that taught the lesson.

Categories: "deception", "detection", "voting", "night_actions", "general"
Keep items concise (1-2 sentences). Suggest 0-3 updates per game."#,
            outcome = if won { "won" } else { "lost" },
            survived = if survived { "Yes" } else { "No" },
        )
    }

    pub fn reflector_user() -> &'static str {
        "Analyze the game and suggest cheatsheet updates."
    }

    pub fn curator_system(
        player_name: &str,
        player_id: &str,
        cheatsheet: &str,
        reflector_output: &str,
    ) -> String {
        format!(
            r#"You are curating cheatsheet updates for player {player_name}.
Your job is to accept, reject, or merge proposed changes to maintain a high-quality, non-redundant cheatsheet.

PLAYER ID: {player_id}

CURRENT CHEATSHEET:
{cheatsheet}

PROPOSED UPDATES FROM REFLECTOR:
{reflector_output}

For each proposed delta (by its zero-based delta_index), decide:
- "accept": Add/apply the change as-is
- "reject": Don't apply (not useful, redundant, or wrong)
- "merge": Combine with existing item (specify merge_with_id)

Also:
- Adjust helpfulness_score for existing items based on game performance (+/- 0.1)
- Flag items for pruning if score drops below 0.2"#
        )
    }

    pub fn curator_user() -> &'static str {
        "Review the proposed updates and produce the final cheatsheet."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_core::CheatsheetItem;
    use uuid::Uuid;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_context_contents() {
        let alive = names(&["Alice", "Bob", "Carol", "Eve"]);
        let dead = names(&["Dave"]);
        let discussion = names(&["Alice: I suspect Carol."]);
        let ctx = GameContext {
            player_count: 5,
            day_number: 2,
            alive: &alive,
            dead: &dead,
            player_name: "Bob",
            role: Role::Doctor,
            mafia_partners: &[],
            cheatsheet: "No strategies accumulated yet.",
            discussion: &discussion,
        };
        let rendered = ctx.render();
        assert!(rendered.contains("game of Mafia with 5 players"));
        assert!(rendered.contains("- Day 2"));
        assert!(rendered.contains("- Alive players: Alice, Bob, Carol, Eve"));
        assert!(rendered.contains("- Dead players: Dave"));
        assert!(rendered.contains("- Role: doctor"));
        assert!(rendered.contains("As Doctor"));
        assert!(rendered.contains("Alice: I suspect Carol."));
        assert!(!rendered.contains("fellow Mafia"));
    }

    #[test]
    fn test_lone_mafia_briefing() {
        let alive = names(&["Alice"]);
        let ctx = GameContext {
            player_count: 5,
            day_number: 1,
            alive: &alive,
            dead: &[],
            player_name: "Alice",
            role: Role::Mafia,
            mafia_partners: &[],
            cheatsheet: "",
            discussion: &[],
        };
        let rendered = ctx.render();
        assert!(rendered.contains("none (you're alone)"));
        assert!(rendered.contains("- Dead players: None"));
        assert!(rendered.contains("(No discussion yet)"));
    }

    #[test]
    fn test_vote_user_prompt() {
        let prompt = AgentPrompts::vote_user(&names(&["Alice", "Bob"]));
        assert_eq!(prompt, "Cast your vote. Valid targets: Alice, Bob, or 'no_lynch'");
    }

    #[test]
    fn test_review_render_includes_ids() {
        let item = CheatsheetItem::new("voting", "Watch late switches").with_score(0.75);
        let id = item.id.clone();
        let cs = Cheatsheet::initial(Uuid::new_v4(), vec![item]);
        let rendered = render_for_review(&cs);
        assert_eq!(rendered, format!("- [{}] (voting, score 0.75) Watch late switches", id));
    }
}
