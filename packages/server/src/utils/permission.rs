/// Owner-or-staff access rule shared by every per-resource endpoint.
pub fn authorize(caller_id: i32, resource_owner_id: i32, caller_is_staff: bool) -> bool {
    caller_is_staff || caller_id == resource_owner_id
}
