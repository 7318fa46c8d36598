pub mod invitation_steps;
pub mod roster_steps;
