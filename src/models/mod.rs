mod invite;

pub use invite::{
    CreateInviteDto, CreatedInviteResponse, Invite, InvitePatch, UpdateInviteDto,
    UpdatedInviteResponse,
};
