use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

// Big enough for any 802.11 frame plus radiotap header.
const READ_BUFFER_LEN: usize = 6000;

/// Opens a non-blocking AF_PACKET socket that receives every frame on
/// interface `ifindex`.
pub fn open_socket_rx(ifindex: i32) -> io::Result<OwnedFd> {
    let protocol = (libc::ETH_P_ALL as u16).to_be();

    let raw_fd = unsafe {
        libc::socket(
            libc::AF_PACKET,
            libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            protocol as libc::c_int,
        )
    };
    if raw_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let socket = unsafe { OwnedFd::from_raw_fd(raw_fd) };

    let mut address: libc::sockaddr_ll = unsafe { mem::zeroed() };
    address.sll_family = libc::AF_PACKET as libc::c_ushort;
    address.sll_protocol = protocol;
    address.sll_ifindex = ifindex;

    let bound = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &address as *const libc::sockaddr_ll as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if bound < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(socket)
}

/// Reads one frame. An empty buffer means nothing was waiting.
pub fn read_frame(socket: &OwnedFd) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; READ_BUFFER_LEN];
    let packet_len = unsafe {
        libc::read(
            socket.as_raw_fd(),
            buffer.as_mut_ptr() as *mut libc::c_void,
            buffer.len(),
        )
    };

    if packet_len < 0 {
        let error_code = io::Error::last_os_error();
        if error_code.kind() == io::ErrorKind::WouldBlock {
            return Ok(Vec::new());
        }
        return Err(error_code);
    }

    buffer.truncate(packet_len as usize);
    Ok(buffer)
}
